use super::*;
use serde::Deserialize;

pub(crate) const DEFAULT_TRACE_LOG_LIMIT: usize = 10_000;

/// Page anchors and lookup endpoints the controller binds to.
///
/// Every field has a default matching the CRM enquiry page, so a partial JSON
/// document only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub enquiry_type_id: String,
    pub tender_class: String,
    pub referral_class: String,
    pub dependent_selects: Vec<DependentSelectConfig>,
    pub trace_log_limit: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            enquiry_type_id: "id_enquiry_type".into(),
            tender_class: "tender-field".into(),
            referral_class: "referral-field".into(),
            dependent_selects: vec![DependentSelectConfig::default()],
            trace_log_limit: DEFAULT_TRACE_LOG_LIMIT,
        }
    }
}

/// A parent select whose value keys a lookup that fills a child select.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DependentSelectConfig {
    pub parent_id: String,
    pub child_id: String,
    pub lookup_url: String,
    pub query_param: String,
    pub placeholder: String,
}

impl Default for DependentSelectConfig {
    fn default() -> Self {
        Self {
            parent_id: "id_customer".into(),
            child_id: "id_contact_person".into(),
            lookup_url: "/crm/ajax/get-contact-persons/".into(),
            query_param: "customer_id".into(),
            placeholder: "Select Contact Person".into(),
        }
    }
}

impl ControllerConfig {
    pub fn from_json(src: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(src).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trace_log_limit == 0 {
            return Err(Error::Config(
                "trace_log_limit requires at least 1 entry".into(),
            ));
        }
        for (name, value) in [
            ("enquiry_type_id", &self.enquiry_type_id),
            ("tender_class", &self.tender_class),
            ("referral_class", &self.referral_class),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} must not be empty")));
            }
        }
        for (pos, binding) in self.dependent_selects.iter().enumerate() {
            for (name, value) in [
                ("parent_id", &binding.parent_id),
                ("child_id", &binding.child_id),
                ("lookup_url", &binding.lookup_url),
                ("query_param", &binding.query_param),
            ] {
                if value.trim().is_empty() {
                    return Err(Error::Config(format!(
                        "dependent_selects[{pos}].{name} must not be empty"
                    )));
                }
            }
            if binding.parent_id == binding.child_id {
                return Err(Error::Config(format!(
                    "dependent_selects[{pos}] uses {} as both parent and child",
                    binding.parent_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() -> Result<()> {
        let config = ControllerConfig::from_json(
            r#"{
              "dependent_selects": [
                {"lookup_url": "/sites/ajax/contacts/"},
                {"parent_id": "id_customer", "child_id": "id_project",
                 "lookup_url": "/crm/ajax/load-projects/", "placeholder": "Select Project"}
              ]
            }"#,
        )?;
        assert_eq!(config.enquiry_type_id, "id_enquiry_type");
        assert_eq!(config.trace_log_limit, DEFAULT_TRACE_LOG_LIMIT);
        assert_eq!(config.dependent_selects.len(), 2);
        assert_eq!(config.dependent_selects[0].child_id, "id_contact_person");
        assert_eq!(config.dependent_selects[0].lookup_url, "/sites/ajax/contacts/");
        assert_eq!(config.dependent_selects[1].query_param, "customer_id");
        assert_eq!(config.dependent_selects[1].placeholder, "Select Project");
        Ok(())
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            ControllerConfig::from_json(r#"{"trace_log_limit": 0}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ControllerConfig::from_json(r#"{"tender_class": " "}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ControllerConfig::from_json(
                r#"{"dependent_selects": [{"child_id": "id_customer"}]}"#
            ),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ControllerConfig::from_json("[1, 2]"),
            Err(Error::Config(_))
        ));
    }
}
