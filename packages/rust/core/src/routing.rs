//! Source routing: which form serves which role for a maturity level.

use std::collections::BTreeMap;

use toolscope_shared::{Maturity, Result, Role, SourceCatalog};

/// The form id of every role for one maturity level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoute {
    pub maturity: Maturity,
    forms: BTreeMap<Role, String>,
}

impl SourceRoute {
    /// Form id serving `role`; empty when the source is not configured.
    pub fn form_id(&self, role: Role) -> &str {
        self.forms.get(&role).map(String::as_str).unwrap_or("")
    }

    /// Form ids in role order (may repeat when roles share a form).
    pub fn form_ids(&self) -> impl Iterator<Item = &str> {
        self.forms.values().map(String::as_str)
    }
}

/// Route a tool's submitted maturity label to its source forms.
///
/// Fails with [`toolscope_shared::ToolScopeError::UnknownMaturity`] when the
/// label is neither `early` nor `advanced`.
pub fn route_sources(catalog: &SourceCatalog, maturity_label: &str) -> Result<SourceRoute> {
    let maturity: Maturity = maturity_label.parse()?;
    Ok(route_for(catalog, maturity))
}

/// Route an already parsed maturity level.
pub fn route_for(catalog: &SourceCatalog, maturity: Maturity) -> SourceRoute {
    let forms = Role::ALL
        .iter()
        .map(|role| (*role, catalog.form_id(*role, maturity).to_string()))
        .collect();
    SourceRoute { maturity, forms }
}
