// Route handler modules

pub mod embed;
pub mod health;
pub mod ready;
pub mod root;
pub mod system_info;
