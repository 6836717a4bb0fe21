// Business domains
pub mod cleanse;
