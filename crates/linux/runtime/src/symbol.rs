use std::fmt;
use std::error;

use libc::c_char;

/// Longest symbol name we resolve. Names are copied to the stack so lookups never allocate.
const MAX_SYMBOL_LENGTH: usize = 63;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ResolveError {
    InvalidSymbolName,
    SymbolNotFound,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::InvalidSymbolName => write!(f, "invalid symbol name"),
            ResolveError::SymbolNotFound => write!(f, "symbol not found"),
        }
    }
}

impl error::Error for ResolveError {}

/// Locates the next definition of `symbol` after the calling object in lookup order,
/// falling back to the global scope. This is the definition an interposed symbol shadows.
pub fn lookup_next(symbol: &str) -> Result<usize, ResolveError> {
    with_c_name(symbol, |name| {
        let next = unsafe { libc::dlsym(libc::RTLD_NEXT, name) };
        if !next.is_null() {
            return Ok(next as usize);
        }

        let global = unsafe { libc::dlsym(libc::RTLD_DEFAULT, name) };
        if !global.is_null() {
            return Ok(global as usize);
        }

        Err(ResolveError::SymbolNotFound)
    })?
}

pub fn is_resolvable(symbol: &str) -> bool {
    lookup_next(symbol).is_ok()
}

fn with_c_name<R>(symbol: &str, f: impl FnOnce(*const c_char) -> R) -> Result<R, ResolveError> {
    let bytes = symbol.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_SYMBOL_LENGTH || bytes.contains(&0) {
        return Err(ResolveError::InvalidSymbolName);
    }

    let mut name = [0 as c_char; MAX_SYMBOL_LENGTH + 1];
    for (dst, src) in name.iter_mut().zip(bytes) {
        *dst = *src as c_char;
    }

    Ok(f(name.as_ptr()))
}

#[cfg(test)]
mod tests {
    use crate::symbol::{is_resolvable, lookup_next, ResolveError};

    #[test]
    fn memory_primitives_are_resolvable() {
        for symbol in ["mmap", "munmap", "mremap", "shmat", "shmdt", "sbrk"] {
            assert!(is_resolvable(symbol), "{} should resolve", symbol);
        }
    }

    #[test]
    fn unknown_symbols_are_not_found() {
        let result = lookup_next("membrane_symbol_that_does_not_exist");

        assert_eq!(result, Err(ResolveError::SymbolNotFound));
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert_eq!(lookup_next(""), Err(ResolveError::InvalidSymbolName));
        assert_eq!(lookup_next("mm\0ap"), Err(ResolveError::InvalidSymbolName));
        assert_eq!(lookup_next(&"x".repeat(64)), Err(ResolveError::InvalidSymbolName));
    }
}
