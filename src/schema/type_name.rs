//! Type identifiers.
//!
//! Every message and service type carries a stable identifier of the form
//!
//! ```text
//! <package>/<category>/<module>/<Type>[.<Nested>]
//! ```
//!
//! where `category` is `msgs` for plain messages and `srvs` for services.
//! Service request and response shapes are nested under the service:
//! `demo/srvs/examples/AddTwoInts.Request`.

use std::fmt;

use crate::{Error, Result};

/// Whether an identifier names a plain message or a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Msgs,
    Srvs,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Msgs => "msgs",
            Category::Srvs => "srvs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, borrowed type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeName<'a> {
    pub package: &'a str,
    pub category: Category,
    pub module: &'a str,
    /// Top-level type, e.g. `AddTwoInts`.
    pub name: &'a str,
    /// Nested shape, e.g. `Request`.
    pub nested: Option<&'a str>,
}

impl<'a> TypeName<'a> {
    /// Parse an identifier.
    ///
    /// ```
    /// use svcbus::schema::{Category, TypeName};
    ///
    /// let name = TypeName::parse("demo/srvs/std/Trigger.Request").unwrap();
    /// assert_eq!(name.category, Category::Srvs);
    /// assert_eq!(name.name, "Trigger");
    /// assert_eq!(name.nested, Some("Request"));
    /// ```
    ///
    /// # Errors
    ///
    /// `Error::InvalidTypeName` if the identifier does not have exactly four
    /// non-empty `/`-separated segments, or the category is neither `msgs`
    /// nor `srvs`.
    pub fn parse(identifier: &'a str) -> Result<Self> {
        // ---
        let invalid = |reason: &str| Error::InvalidTypeName {
            name: identifier.to_owned(),
            reason: reason.to_owned(),
        };

        let segments: Vec<&str> = identifier.split('/').collect();
        let [package, category, module, type_part] = segments[..] else {
            return Err(invalid(
                "invalid identifier format, expected <package>/<msgs|srvs>/<module>/<Type>",
            ));
        };

        if segments.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
            return Err(invalid("invalid identifier format, empty or blank segment"));
        }

        let category = match category {
            "msgs" => Category::Msgs,
            "srvs" => Category::Srvs,
            _ => return Err(invalid("category must be 'msgs' or 'srvs'")),
        };

        let (name, nested) = match type_part.split_once('.') {
            Some((name, nested)) => {
                if name.is_empty() || nested.is_empty() || nested.contains('.') {
                    return Err(invalid("invalid identifier format, bad nested type"));
                }
                (name, Some(nested))
            }
            None => (type_part, None),
        };

        Ok(Self {
            package,
            category,
            module,
            name,
            nested,
        })
    }

    /// Fail with `Error::Schema` unless this names a top-level type of `category`.
    pub(crate) fn expect_top_level(&self, category: Category) -> Result<()> {
        // ---
        if self.category != category {
            return Err(Error::Schema(format!(
                "'{self}' is a {} type, expected {category}",
                self.category
            )));
        }
        if let Some(nested) = self.nested {
            return Err(Error::Schema(format!(
                "'{self}' names nested shape '{nested}', expected a top-level type"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TypeName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.package, self.category, self.module, self.name
        )?;
        if let Some(nested) = self.nested {
            write!(f, ".{nested}")?;
        }
        Ok(())
    }
}
