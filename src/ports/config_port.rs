//! Configuration access port trait.

pub trait ConfigPort {
    /// Raw value for `key` in `section`, trimmed. `None` when absent or empty.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn has_section(&self, section: &str) -> bool;

    /// Name used in error messages, typically the file path.
    fn source_name(&self) -> &str;
}
