// Business domains
pub mod outreach;
