pub mod departments;
pub mod health;
pub mod permissions;
pub mod templates;

#[cfg(test)]
mod tests;
