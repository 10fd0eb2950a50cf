//! Task templates: the tabbed forms users fill in to build a prompt.

use crate::error::{LukeError, Result};
use crate::paths;
use crate::store::{Record, RecordTable, Store, TEMPLATES};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    LongText,
    Select {
        options: Vec<String>,
    },
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Url,
    Email,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub max_len: Option<usize>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateTab {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub fields: Vec<TemplateField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub tabs: Vec<TemplateTab>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for TaskTemplate {
    const TABLE: RecordTable = TEMPLATES;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Editable template content, shared by create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInput {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub tabs: Vec<TemplateTab>,
    #[serde(default)]
    pub is_public: bool,
}

impl TaskTemplate {
    pub fn fields(&self) -> impl Iterator<Item = &TemplateField> {
        self.tabs.iter().flat_map(|t| t.fields.iter())
    }
}

// ---------------------------------------------------------------------------
// Validation of template definitions
// ---------------------------------------------------------------------------

fn validate_input(input: &TemplateInput) -> Result<()> {
    paths::validate_slug(&input.slug)?;
    crate::validate::validate_name("name", &input.name)?;
    if input.prompt.trim().is_empty() {
        return Err(LukeError::InvalidInput("prompt is required".into()));
    }
    let mut tab_keys = HashSet::new();
    let mut field_keys = HashSet::new();
    for tab in &input.tabs {
        if !tab_keys.insert(tab.key.as_str()) {
            return Err(LukeError::InvalidInput(format!(
                "duplicate tab key '{}'",
                tab.key
            )));
        }
        for field in &tab.fields {
            if field.key.trim().is_empty() {
                return Err(LukeError::InvalidInput(format!(
                    "tab '{}' has a field without a key",
                    tab.key
                )));
            }
            if !field_keys.insert(field.key.as_str()) {
                return Err(LukeError::InvalidInput(format!(
                    "duplicate field key '{}'",
                    field.key
                )));
            }
            if let FieldKind::Select { options } = &field.kind {
                if options.is_empty() {
                    return Err(LukeError::InvalidInput(format!(
                        "select field '{}' has no options",
                        field.key
                    )));
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

pub fn create(store: &Store, input: TemplateInput) -> Result<TaskTemplate> {
    validate_input(&input)?;
    if find_by_slug(store, &input.slug)?.is_some() {
        return Err(LukeError::TemplateExists(input.slug));
    }
    let now = Utc::now();
    let template = TaskTemplate {
        id: uuid::Uuid::new_v4().to_string(),
        slug: input.slug,
        name: input.name.trim().to_string(),
        description: input.description,
        category: input.category,
        system_prompt: input.system_prompt.filter(|s| !s.trim().is_empty()),
        prompt: input.prompt,
        tabs: input.tabs,
        is_public: input.is_public,
        created_at: now,
        updated_at: now,
    };
    if !store.put_unique(&template, |t| t.slug == template.slug)? {
        return Err(LukeError::TemplateExists(template.slug));
    }
    tracing::info!(slug = %template.slug, "template created");
    Ok(template)
}

pub fn update(store: &Store, id: &str, input: TemplateInput) -> Result<TaskTemplate> {
    validate_input(&input)?;
    let mut template = get(store, id)?;
    if let Some(other) = find_by_slug(store, &input.slug)? {
        if other.id != template.id {
            return Err(LukeError::TemplateExists(input.slug));
        }
    }
    template.slug = input.slug;
    template.name = input.name.trim().to_string();
    template.description = input.description;
    template.category = input.category;
    template.system_prompt = input.system_prompt.filter(|s| !s.trim().is_empty());
    template.prompt = input.prompt;
    template.tabs = input.tabs;
    template.is_public = input.is_public;
    template.updated_at = Utc::now();
    if !store.put_unique(&template, |t| t.slug == template.slug && t.id != template.id)? {
        return Err(LukeError::TemplateExists(template.slug));
    }
    Ok(template)
}

pub fn get(store: &Store, id: &str) -> Result<TaskTemplate> {
    store
        .get(id)?
        .ok_or_else(|| LukeError::TemplateNotFound(id.to_string()))
}

pub fn find_by_slug(store: &Store, slug: &str) -> Result<Option<TaskTemplate>> {
    Ok(store
        .filter::<TaskTemplate>(|t| t.slug == slug)?
        .into_iter()
        .next())
}

/// All templates ordered by category then name.
pub fn list(store: &Store) -> Result<Vec<TaskTemplate>> {
    let mut all = store.list::<TaskTemplate>()?;
    all.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
    Ok(all)
}

pub fn list_public(store: &Store) -> Result<Vec<TaskTemplate>> {
    Ok(list(store)?.into_iter().filter(|t| t.is_public).collect())
}

pub fn delete(store: &Store, id: &str) -> Result<()> {
    if !store.delete::<TaskTemplate>(id)? {
        return Err(LukeError::TemplateNotFound(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+)\s*\}\}").unwrap())
}

/// Fill `{{ key }}` placeholders from submitted values. Known fields with no
/// value render empty; placeholders naming no field are left as written.
pub fn render(template: &TaskTemplate, values: &BTreeMap<String, String>) -> String {
    let known: HashSet<&str> = template.fields().map(|f| f.key.as_str()).collect();
    placeholder_re()
        .replace_all(&template.prompt, |caps: &regex::Captures| {
            let key = &caps[1];
            if known.contains(key) {
                values.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::tests::temp_store;

    pub(crate) fn persona_input() -> TemplateInput {
        TemplateInput {
            slug: "persona-journey".into(),
            name: "Persona journey".into(),
            description: "Map a journey for one persona".into(),
            category: "research".into(),
            system_prompt: None,
            prompt: "Map the journey of {{persona}} trying to {{ goal }} on {{platform}}. {{unknown}}"
                .into(),
            tabs: vec![
                TemplateTab {
                    key: "who".into(),
                    label: "Who".into(),
                    fields: vec![TemplateField {
                        key: "persona".into(),
                        label: "Persona".into(),
                        kind: FieldKind::Text,
                        required: true,
                        max_len: Some(40),
                        placeholder: None,
                    }],
                },
                TemplateTab {
                    key: "what".into(),
                    label: "What".into(),
                    fields: vec![
                        TemplateField {
                            key: "goal".into(),
                            label: "Goal".into(),
                            kind: FieldKind::LongText,
                            required: true,
                            max_len: None,
                            placeholder: None,
                        },
                        TemplateField {
                            key: "platform".into(),
                            label: "Platform".into(),
                            kind: FieldKind::Select {
                                options: vec!["web".into(), "ios".into()],
                            },
                            required: false,
                            max_len: None,
                            placeholder: None,
                        },
                    ],
                },
            ],
            is_public: true,
        }
    }

    #[test]
    fn create_and_fetch() {
        let (_dir, store) = temp_store();
        let t = create(&store, persona_input()).unwrap();
        assert_eq!(get(&store, &t.id).unwrap().slug, "persona-journey");
        assert_eq!(list_public(&store).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_slug_conflicts() {
        let (_dir, store) = temp_store();
        create(&store, persona_input()).unwrap();
        assert!(matches!(
            create(&store, persona_input()),
            Err(LukeError::TemplateExists(_))
        ));
    }

    #[test]
    fn update_keeps_id_and_allows_same_slug() {
        let (_dir, store) = temp_store();
        let t = create(&store, persona_input()).unwrap();
        let mut input = persona_input();
        input.name = "Persona journey v2".into();
        input.is_public = false;
        let updated = update(&store, &t.id, input).unwrap();
        assert_eq!(updated.id, t.id);
        assert_eq!(updated.name, "Persona journey v2");
        assert!(list_public(&store).unwrap().is_empty());
    }

    #[test]
    fn update_onto_taken_slug_conflicts() {
        let (_dir, store) = temp_store();
        create(&store, persona_input()).unwrap();
        let mut other = persona_input();
        other.slug = "checkout-audit".into();
        let other = create(&store, other).unwrap();
        assert!(matches!(
            update(&store, &other.id, persona_input()),
            Err(LukeError::TemplateExists(_))
        ));
        assert_eq!(get(&store, &other.id).unwrap().slug, "checkout-audit");
    }

    #[test]
    fn rejects_bad_definitions() {
        let (_dir, store) = temp_store();
        let mut input = persona_input();
        input.slug = "Bad Slug".into();
        assert!(matches!(
            create(&store, input),
            Err(LukeError::InvalidSlug(_))
        ));

        let mut input = persona_input();
        input.tabs[1].fields[0].key = "persona".into();
        assert!(matches!(
            create(&store, input),
            Err(LukeError::InvalidInput(_))
        ));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            delete(&store, "nope"),
            Err(LukeError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn render_fills_known_and_keeps_unknown() {
        let (_dir, store) = temp_store();
        let t = create(&store, persona_input()).unwrap();
        let mut values = BTreeMap::new();
        values.insert("persona".to_string(), " Nurse on night shift ".to_string());
        values.insert("goal".to_string(), "log medication".to_string());
        assert_eq!(
            render(&t, &values),
            "Map the journey of Nurse on night shift trying to log medication on . {{unknown}}"
        );
    }
}
