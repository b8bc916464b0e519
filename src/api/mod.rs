pub mod openai;
pub mod runway;
