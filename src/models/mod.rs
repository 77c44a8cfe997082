pub mod link;
pub mod link_stats;
