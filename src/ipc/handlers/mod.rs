pub mod accounts;
pub mod core;
pub mod courses;
pub mod duplicates;
pub mod grades;
pub mod students;
