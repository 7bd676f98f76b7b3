use crate::utils::error::DefinitionError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static PORT_NAME_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("port name regex"));

/// Operational vocabulary of the component contract. Letting a port shadow
/// one of these would make introspection and wiring calls ambiguous.
static RESERVED_PORT_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "call_port",
        "connect_port",
        "disconnect_port",
        "get_needs",
        "get_provides",
        "set_provider",
        "is_bound",
        "instantiate",
        "needs",
        "provides",
        "deps",
        "meta",
    ]
    .into_iter()
    .collect()
});

pub fn is_valid_port_name(name: &str) -> bool {
    PORT_NAME_FORMAT.is_match(name) && !RESERVED_PORT_NAMES.contains(name)
}

/// Lowercase snake_case, starting with a letter.
pub fn check_port_name_format(name: &str) -> Result<(), DefinitionError> {
    if PORT_NAME_FORMAT.is_match(name) {
        Ok(())
    } else {
        Err(DefinitionError::InvalidPortName {
            name: name.to_string(),
        })
    }
}

pub fn check_reserved_name(name: &str) -> Result<(), DefinitionError> {
    if RESERVED_PORT_NAMES.contains(name) {
        Err(DefinitionError::ReservedPortName {
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}
