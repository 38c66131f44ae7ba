//! Property names and class ids the engine relies on.
//!
//! Catalog documents are free-form property bags; these names are the
//! subset with engine-defined meaning.

/// Root class of every top-level (selectable) object.
pub const BASE_OBJECT_CLASS: &str = "BaseObject";
/// Root class of every child needer object.
pub const BASE_NEEDER_CLASS: &str = "BaseNeeder";
/// Root class of every child provider object.
pub const BASE_PROVIDER_CLASS: &str = "BaseProvider";
/// Root class of every rule object.
pub const BASE_RULE_CLASS: &str = "BaseRule";

/// Classes allowed to have no parent.
pub const MODEL_ROOT_CLASSES: &[&str] = &[
    BASE_OBJECT_CLASS,
    BASE_NEEDER_CLASS,
    BASE_PROVIDER_CLASS,
    BASE_RULE_CLASS,
];

/// Common rule class backed by the property-value allow-list filter.
pub const PROPERTY_VALUE_FILTER_CLASS: &str = "PropertyValueFilter";
/// Common rule class backed by the per-session instance cap.
pub const SESSION_MAXIMUM_FILTER_CLASS: &str = "SessionMaximumFilter";

pub const DESCRIPTION: &str = "description";
pub const PART_NUMBER: &str = "partNumber";
/// Per-session instance cap read by the session-maximum filter.
pub const MAXIMUM: &str = "maximum";
/// Ordering key; lower validates first. Also orders rules.
pub const VALIDATION_ORDER: &str = "validationOrder";
pub const VALIDATION_STATUS: &str = "validationStatus";
pub const PROVIDER_LIST: &str = "providerObjectIds";
pub const NEEDER_LIST: &str = "neederObjectIds";
pub const PROTOCOL_TYPE: &str = "protocolType";
pub const QTY_PROVIDED: &str = "quantityProvided";
pub const QTY_NEEDED: &str = "quantityNeeded";
pub const APPLICABLE_CLASS_ID_LIST: &str = "applicableClassIds";
pub const APPLICABLE_OBJECT_ID_LIST: &str = "applicableObjectIds";
pub const INAPPLICABLE_OBJECT_ID_LIST: &str = "inapplicableObjectIds";
/// Classes whose objects may parent a provider for a needer.
pub const PROVIDER_CLASS_ID_LIST: &str = "providerParentClassIds";
pub const TRY_NEW_PROVIDERS: &str = "tryNewProviders";
/// Tag binding a rule class to an executable rule.
pub const RULE_KIND: &str = "ruleKind";
pub const SATISFYING_PROVIDER_ID: &str = "satisfyingProviderId";
pub const SATISFYING_PROVIDER_MODEL_ID: &str = "satisfyingProviderModelId";

/// Property-value filter configuration.
pub const RULE_PROPERTY_NAME: &str = "objectPropertyName";
pub const RULE_PROPERTY_PERMITTED_VALUES: &str = "permittedObjectPropertyValues";
pub const RULE_PROPERTY_ON_PARENT: &str = "objectPropertyOnParent";

/// Protocol value matching any protocol.
pub const ANY_PROTOCOL: &str = "AnyProtocol";

pub const RULE_KIND_PROPERTY_VALUE_FILTER: &str = "property_value_filter";
pub const RULE_KIND_SESSION_MAXIMUM_FILTER: &str = "session_maximum_filter";

pub const STATUS_UNVALIDATED: &str = "UNVALIDATED";
pub const STATUS_SUCCESSFUL: &str = "SUCCESSFUL";
pub const STATUS_FAILED: &str = "FAILED";
