pub mod accounts;
pub mod admin;
pub mod blueprints;
pub mod figma;
pub mod health;
pub mod history;
pub mod playbook;
pub mod projects;
pub mod promo;
pub mod tasks;
pub mod templates;
pub mod wireframes;
