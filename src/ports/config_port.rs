//! Configuration access port trait.

pub trait ConfigPort {
    /// Raw value of `[section] key`, `None` when absent. Typed parsing and
    /// range checks happen in `config_validation`.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
}
