//! # Catalog
//!
//! Customers, products and editions that licenses are issued against, and
//! the [`Catalog`] lookup trait the orchestrator consumes.
//!
//! [`InMemoryCatalog`] is loaded from a YAML document:
//!
//! ```yaml
//! customers:
//!   - id: cust-1001
//!     name: Acme Analytics GmbH
//! products:
//!   - id: prod-data-pipeline
//!     code: data-pipeline-app
//!     name: Data Pipeline
//! editions:
//!   - id: ed-enterprise
//!     product_id: prod-data-pipeline
//!     code: enterprise
//!     name: Enterprise
//! templates:
//!   - id: tmpl-ent-annual
//!     name: Enterprise Annual
//!     product_id: prod-data-pipeline
//!     edition_id: ed-enterprise
//!     license_type: subscription
//!     duration_days: 365
//! keys:
//!   - key_id: main-v1
//!     alg: Ed25519
//!     description: Production signing key
//! ```
//!
//! The `keys` section registers the key ids that may appear in
//! `meta.key_id`. It holds metadata only; key material never enters the
//! catalog.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use lic_core::{CustomerId, EditionId, ProductId, Timestamp, MAX_ID_LEN};
use lic_crypto::KeyAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, EntityKind};
use crate::template::LicenseTemplate;

/// A legal entity that owns licenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Customer {
    pub fn new(id: CustomerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            external_ref: None,
            contact_email: None,
            contact_person: None,
            notes: None,
        }
    }
}

/// A licensed product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Short code carried in the payload (e.g. `data-pipeline-app`).
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the product is currently sold. Informational for catalog
    /// administration; issuance does not consult it.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Product {
    pub fn new(id: ProductId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            description: None,
            is_active: true,
        }
    }
}

/// A tier of a product (community, pro, enterprise).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edition {
    pub id: EditionId,
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the edition is currently offered. Informational, like
    /// [`Product::is_active`].
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Edition {
    pub fn new(
        id: EditionId,
        product_id: ProductId,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            product_id,
            code: code.into(),
            name: name.into(),
            description: None,
            is_active: true,
        }
    }
}

/// Registration of a signing key id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyMetadata {
    /// Value carried in `meta.key_id`.
    pub key_id: String,
    pub alg: KeyAlgorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether new licenses may be signed under this id.
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<Timestamp>,
}

impl KeyMetadata {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            alg: KeyAlgorithm::Ed25519,
            description: None,
            is_active: true,
            retired_at: None,
        }
    }

    /// Active and not retired.
    pub fn is_usable(&self) -> bool {
        self.is_active && self.retired_at.is_none()
    }
}

fn default_true() -> bool {
    true
}

/// Entity lookups consumed by the issuance orchestrator.
///
/// `Ok(None)` means the entity does not exist; `Err` means the backend
/// could not answer.
pub trait Catalog: Send + Sync {
    fn customer(&self, id: &CustomerId) -> Result<Option<Customer>, CatalogError>;

    fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError>;

    fn edition(&self, id: &EditionId) -> Result<Option<Edition>, CatalogError>;

    fn template(&self, id: &str) -> Result<Option<LicenseTemplate>, CatalogError>;

    /// Registered metadata for a signing key id.
    fn key_metadata(&self, key_id: &str) -> Result<Option<KeyMetadata>, CatalogError>;
}

/// The on-disk catalog shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub editions: Vec<Edition>,
    #[serde(default)]
    pub templates: Vec<LicenseTemplate>,
    #[serde(default)]
    pub keys: Vec<KeyMetadata>,
}

/// Read-only catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    customers: HashMap<CustomerId, Customer>,
    products: HashMap<ProductId, Product>,
    editions: HashMap<EditionId, Edition>,
    templates: HashMap<String, LicenseTemplate>,
    keys: HashMap<String, KeyMetadata>,
}

impl InMemoryCatalog {
    /// Load and validate a YAML catalog file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            customers = catalog.customers.len(),
            products = catalog.products.len(),
            editions = catalog.editions.len(),
            templates = catalog.templates.len(),
            keys = catalog.keys.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Parse and validate a YAML catalog document.
    pub fn from_yaml_str(text: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_yaml::from_str(text)?;
        Self::from_document(doc)
    }

    /// Validate a catalog document and index it.
    ///
    /// # Errors
    ///
    /// - `Duplicate` for repeated ids of the same kind.
    /// - `Invalid` for blank names or codes, editions pointing at unknown
    ///   products, repeated `(product_id, code)` pairs, duplicate product
    ///   codes, templates whose product or edition is unknown or whose
    ///   edition belongs to another product, and keys with a blank or
    ///   over-long id or marked active despite a `retired_at`.
    pub fn from_document(doc: CatalogDocument) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();

        for customer in doc.customers {
            require_text("customer", customer.id.as_str(), "name", &customer.name)?;
            let id = customer.id.clone();
            if catalog.customers.insert(id.clone(), customer).is_some() {
                return Err(duplicate(EntityKind::Customer, id.as_str()));
            }
        }

        let mut product_codes = HashSet::new();
        for product in doc.products {
            require_text("product", product.id.as_str(), "name", &product.name)?;
            require_text("product", product.id.as_str(), "code", &product.code)?;
            if !product_codes.insert(product.code.clone()) {
                return Err(CatalogError::Invalid(format!(
                    "product code {:?} is used by more than one product",
                    product.code
                )));
            }
            let id = product.id.clone();
            if catalog.products.insert(id.clone(), product).is_some() {
                return Err(duplicate(EntityKind::Product, id.as_str()));
            }
        }

        let mut edition_codes = HashSet::new();
        for edition in doc.editions {
            require_text("edition", edition.id.as_str(), "name", &edition.name)?;
            require_text("edition", edition.id.as_str(), "code", &edition.code)?;
            if !catalog.products.contains_key(&edition.product_id) {
                return Err(CatalogError::Invalid(format!(
                    "edition {} references unknown product {}",
                    edition.id, edition.product_id
                )));
            }
            if !edition_codes.insert((edition.product_id.clone(), edition.code.clone())) {
                return Err(CatalogError::Invalid(format!(
                    "edition code {:?} is repeated for product {}",
                    edition.code, edition.product_id
                )));
            }
            let id = edition.id.clone();
            if catalog.editions.insert(id.clone(), edition).is_some() {
                return Err(duplicate(EntityKind::Edition, id.as_str()));
            }
        }

        let mut template_names = HashSet::new();
        for template in doc.templates {
            catalog.check_template(&template)?;
            if !template_names.insert(template.name.clone()) {
                return Err(CatalogError::Invalid(format!(
                    "template name {:?} is used more than once",
                    template.name
                )));
            }
            let id = template.id.clone();
            if catalog.templates.insert(id.clone(), template).is_some() {
                return Err(duplicate(EntityKind::Template, &id));
            }
        }

        for key in doc.keys {
            let key_id = key.key_id.trim();
            if key_id.is_empty() || key_id.len() > MAX_ID_LEN || key_id != key.key_id {
                return Err(CatalogError::Invalid(format!(
                    "key id {:?} must be 1-{MAX_ID_LEN} characters without surrounding whitespace",
                    key.key_id
                )));
            }
            if key.is_active && key.retired_at.is_some() {
                return Err(CatalogError::Invalid(format!(
                    "key {} is marked active but has retired_at set",
                    key.key_id
                )));
            }
            let id = key.key_id.clone();
            if catalog.keys.insert(id.clone(), key).is_some() {
                return Err(duplicate(EntityKind::Key, &id));
            }
        }

        Ok(catalog)
    }

    fn check_template(&self, template: &LicenseTemplate) -> Result<(), CatalogError> {
        if template.id.trim().is_empty() {
            return Err(CatalogError::Invalid("template id must not be empty".into()));
        }
        require_text("template", &template.id, "name", &template.name)?;
        if !self.products.contains_key(&template.product_id) {
            return Err(CatalogError::Invalid(format!(
                "template {} references unknown product {}",
                template.id, template.product_id
            )));
        }
        match self.editions.get(&template.edition_id) {
            None => Err(CatalogError::Invalid(format!(
                "template {} references unknown edition {}",
                template.id, template.edition_id
            ))),
            Some(edition) if edition.product_id != template.product_id => {
                Err(CatalogError::Invalid(format!(
                    "template {}: edition {} does not belong to product {}",
                    template.id, template.edition_id, template.product_id
                )))
            }
            Some(_) => Ok(()),
        }
    }

    /// All templates, sorted by name.
    pub fn templates(&self) -> Vec<&LicenseTemplate> {
        let mut out: Vec<_> = self.templates.values().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

fn require_text(kind: &str, id: &str, field: &str, value: &str) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        return Err(CatalogError::Invalid(format!(
            "{kind} {id}: {field} must not be empty"
        )));
    }
    Ok(())
}

fn duplicate(kind: EntityKind, id: &str) -> CatalogError {
    CatalogError::Duplicate {
        kind,
        id: id.to_string(),
    }
}

impl Catalog for InMemoryCatalog {
    fn customer(&self, id: &CustomerId) -> Result<Option<Customer>, CatalogError> {
        Ok(self.customers.get(id).cloned())
    }

    fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(self.products.get(id).cloned())
    }

    fn edition(&self, id: &EditionId) -> Result<Option<Edition>, CatalogError> {
        Ok(self.editions.get(id).cloned())
    }

    fn template(&self, id: &str) -> Result<Option<LicenseTemplate>, CatalogError> {
        Ok(self.templates.get(id).cloned())
    }

    fn key_metadata(&self, key_id: &str) -> Result<Option<KeyMetadata>, CatalogError> {
        Ok(self.keys.get(key_id).cloned())
    }
}
