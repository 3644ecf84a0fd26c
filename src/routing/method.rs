//! Request verbs shared by both protocols.

use std::fmt;

/// A request verb with a bit-flag code so routes can accept several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    Options,
}

impl Method {
    /// Every verb, in lookup order.
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Head,
        Method::Patch,
        Method::Options,
    ];

    /// Bit-flag code used by route method masks.
    pub fn code(self) -> u32 {
        match self {
            Method::Get => 1 << 0,
            Method::Post => 1 << 1,
            Method::Put => 1 << 2,
            Method::Delete => 1 << 3,
            Method::Head => 1 << 4,
            Method::Patch => 1 << 5,
            Method::Options => 1 << 6,
        }
    }

    /// Exact, case-sensitive verb token lookup.
    pub fn from_token(token: &str) -> Option<Method> {
        Self::ALL.into_iter().find(|method| method.as_str() == token)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_bits() {
        let all = Method::ALL;
        let mask = all.iter().fold(0u32, |acc, m| {
            assert_eq!(acc & m.code(), 0);
            acc | m.code()
        });
        assert_eq!(mask.count_ones(), all.len() as u32);
    }

    #[test]
    fn token_lookup_is_exact() {
        assert_eq!(Method::from_token("GET"), Some(Method::Get));
        assert_eq!(Method::from_token("get"), None);
        assert_eq!(Method::from_token("G"), None);
        assert_eq!(Method::from_token("GETX"), None);
    }

    #[test]
    fn every_verb_resolves_from_its_own_token() {
        for method in Method::ALL {
            assert_eq!(Method::from_token(method.as_str()), Some(method));
        }
    }
}
