//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

// Planner configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default recursion limit of tree traversals.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Per-query planner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum recursion depth of any tree traversal before `TooComplex`.
    ///
    /// Each level costs one frame of the traversal, up to about 7 KiB in an
    /// unoptimized build. The default keeps the deepest walk under 1 MiB so
    /// it fits a 2 MiB test or worker thread stack. Raise it only together
    /// with the stack size of the threads that plan queries.
    pub max_depth: usize,
    /// Expression lists longer than this get a lazily built name index.
    pub hash_index_threshold: usize,
    /// Walk binding paths when placing predicates; when off, predicates stay
    /// at the node they were added to.
    pub pushdown: bool,
    /// 128-bit integers are available as accumulator and `hugeint` type.
    pub have_hge: bool,
    /// The store refuses modifications of persistent tables.
    pub read_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            hash_index_threshold: 4,
            pushdown: true,
            have_hge: true,
            read_only: false,
        }
    }
}

impl Config {
    /// Parse a JSON object; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Config = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be positive".into()));
        }
        Ok(())
    }
}
