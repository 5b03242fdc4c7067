pub mod agent;
pub mod work_item;
