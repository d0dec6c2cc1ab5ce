// ABOUTME: Process-wide registry mapping credential type names to schema and hook.
// ABOUTME: Built once at startup, shared by reference, never mutated afterwards.

use crate::schema::{Attributes, CredentialSchema};
use crate::types::CredentialKind;
use crate::validation::ValidationErrors;
use keychain_ssh::KeyIntrospect;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A registered type: its variant plus the schema built for it.
#[derive(Debug, Clone)]
pub struct CredentialType {
    pub kind: CredentialKind,
    pub schema: CredentialSchema,
}

impl CredentialType {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn title(&self) -> &'static str {
        self.kind.title()
    }
}

/// Lookup and two-phase validation over every registered credential type.
pub struct CredentialTypeRegistry {
    types: BTreeMap<&'static str, CredentialType>,
    introspector: Arc<dyn KeyIntrospect>,
}

impl CredentialTypeRegistry {
    /// Register every credential variant.
    pub fn new(introspector: Arc<dyn KeyIntrospect>) -> Self {
        let types = CredentialKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind.name(),
                    CredentialType {
                        kind,
                        schema: kind.schema(),
                    },
                )
            })
            .collect();

        Self {
            types,
            introspector,
        }
    }

    pub fn get(&self, name: &str) -> Option<&CredentialType> {
        self.types.get(name)
    }

    /// Registered types ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &CredentialType> {
        self.types.values()
    }

    /// Validate `attributes` for `type_name`, normalizing them in place.
    ///
    /// An unknown type yields a single `"{schema_name}.type"` error and nothing
    /// else runs. Structural errors stop validation before the semantic hook.
    /// All paths are nested under `"{schema_name}.attributes"`.
    pub async fn validate(
        &self,
        type_name: &str,
        attributes: &mut Attributes,
        schema_name: &str,
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        let Some(credential_type) = self.get(type_name) else {
            errors.add(format!("{schema_name}.type"), "Invalid type");
            return errors;
        };

        let prefix = format!("{schema_name}.attributes");

        errors.add_child(&prefix, credential_type.schema.validate(attributes));
        if !errors.is_empty() {
            return errors;
        }

        credential_type
            .kind
            .validate_and_pre_save(self.introspector.as_ref(), &mut errors, &prefix, attributes)
            .await;

        errors
    }
}
