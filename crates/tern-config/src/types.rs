use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// ECMAScript version the transpiler is instructed to emit.
///
/// Later versions keep more modern syntax as-is; earlier versions lower it
/// where the transformer supports doing so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EsTarget {
    /// ECMAScript 5. Default, for the widest browser reach.
    #[default]
    #[serde(rename = "es5")]
    Es5,

    /// ECMAScript 2015 (ES6): classes, arrow functions, let/const.
    #[serde(rename = "es2015", alias = "es6")]
    Es2015,

    #[serde(rename = "es2016")]
    Es2016,

    /// ECMAScript 2017: async/await.
    #[serde(rename = "es2017")]
    Es2017,

    #[serde(rename = "es2018")]
    Es2018,

    #[serde(rename = "es2019")]
    Es2019,

    /// ECMAScript 2020: optional chaining, nullish coalescing.
    #[serde(rename = "es2020")]
    Es2020,

    #[serde(rename = "es2021")]
    Es2021,

    /// ECMAScript 2022: class fields, top-level await.
    #[serde(rename = "es2022")]
    Es2022,

    /// Latest syntax, passed through untouched.
    #[serde(rename = "esnext")]
    Esnext,
}

impl EsTarget {
    pub const ALL: [EsTarget; 10] = [
        EsTarget::Es5,
        EsTarget::Es2015,
        EsTarget::Es2016,
        EsTarget::Es2017,
        EsTarget::Es2018,
        EsTarget::Es2019,
        EsTarget::Es2020,
        EsTarget::Es2021,
        EsTarget::Es2022,
        EsTarget::Esnext,
    ];

    /// Lowercase name understood by the transformer (`"es2015"`, `"esnext"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            EsTarget::Es5 => "es5",
            EsTarget::Es2015 => "es2015",
            EsTarget::Es2016 => "es2016",
            EsTarget::Es2017 => "es2017",
            EsTarget::Es2018 => "es2018",
            EsTarget::Es2019 => "es2019",
            EsTarget::Es2020 => "es2020",
            EsTarget::Es2021 => "es2021",
            EsTarget::Es2022 => "es2022",
            EsTarget::Esnext => "esnext",
        }
    }
}

impl fmt::Display for EsTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EsTarget {
    type Err = String;

    /// Case-insensitive, so `ES5` and `ES2015` from older command lines keep working.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "es6" {
            return Ok(EsTarget::Es2015);
        }
        EsTarget::ALL
            .into_iter()
            .find(|target| target.as_str() == lower)
            .ok_or_else(|| {
                format!(
                    "unknown target '{}', expected one of: es5, es6, {}",
                    s,
                    EsTarget::ALL[1..]
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// How semantic diagnostics are surfaced in the browser console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// Diagnostics are not computed.
    #[default]
    None,
    /// Appended as `console.warn(...)` statements.
    Warning,
    /// Appended as `console.error(...)` statements.
    Error,
}

impl DiagnosticLevel {
    pub fn is_enabled(self) -> bool {
        !matches!(self, DiagnosticLevel::None)
    }
}
