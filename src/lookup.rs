use super::*;
use serde::{Deserialize, Deserializer};

/// One record of the contact-person lookup payload.
///
/// Extra keys the server sends (`mobile_1`, `email_company`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactPerson {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: String,
    pub concern_person: String,
    #[serde(default)]
    pub designation: Option<String>,
}

impl ContactPerson {
    pub fn option_label(&self) -> String {
        let designation = self
            .designation
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or("No designation");
        format!("{} - {}", self.concern_person, designation)
    }
}

fn deserialize_record_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(number) => Ok(number.to_string()),
        serde_json::Value::String(text) => Ok(text),
        other => Err(serde::de::Error::custom(format!(
            "unsupported record id: {other}"
        ))),
    }
}

pub(crate) fn parse_contact_persons(
    body: &str,
) -> std::result::Result<Vec<ContactPerson>, LookupFailure> {
    serde_json::from_str::<Vec<ContactPerson>>(body)
        .map_err(|err| LookupFailure::Payload(err.to_string()))
}

/// Every way a lookup can fail collapses into this type; the controller's
/// only reaction is resetting the dependent select to its placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    Transport(String),
    Status(u16),
    Payload(String),
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport failure: {msg}"),
            Self::Status(code) => write!(f, "server answered with status {code}"),
            Self::Payload(msg) => write!(f, "unexpected payload: {msg}"),
        }
    }
}

impl StdError for LookupFailure {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub token: u64,
    /// Position of the dependent-select binding in the controller config.
    pub binding: usize,
    pub url: String,
    pub param: String,
    pub value: String,
}

impl LookupRequest {
    /// GET url with the single query parameter appended.
    pub fn query_url(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            self.url,
            separator,
            encode_query_component(&self.param),
            encode_query_component(&self.value)
        )
    }
}

fn encode_query_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Response rendered; `options` counts the record options (placeholder excluded).
    Applied { options: usize },
    /// Dependent select reset to the placeholder.
    Failed(LookupFailure),
    /// A newer lookup was issued for the same binding; nothing was rendered.
    Stale,
}

/// Answers lookup requests for the controller.
pub trait LookupBackend {
    fn fetch(&mut self, request: &LookupRequest) -> std::result::Result<String, LookupFailure>;
}

/// Backend that answers from responses registered per query url.
#[derive(Debug, Default)]
pub struct MockLookupBackend {
    responses: HashMap<String, std::result::Result<String, LookupFailure>>,
    calls: Vec<String>,
}

impl MockLookupBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_response(&mut self, query_url: &str, body: &str) {
        self.responses
            .insert(query_url.to_string(), Ok(body.to_string()));
    }

    pub fn set_failure(&mut self, query_url: &str, failure: LookupFailure) {
        self.responses.insert(query_url.to_string(), Err(failure));
    }

    pub fn clear(&mut self) {
        self.responses.clear();
    }

    pub fn take_calls(&mut self) -> Vec<String> {
        std::mem::take(&mut self.calls)
    }
}

impl LookupBackend for MockLookupBackend {
    fn fetch(&mut self, request: &LookupRequest) -> std::result::Result<String, LookupFailure> {
        let url = request.query_url();
        self.calls.push(url.clone());
        self.responses.get(&url).cloned().unwrap_or_else(|| {
            Err(LookupFailure::Transport(format!(
                "no response registered for {url}"
            )))
        })
    }
}

/// Hands out monotonically increasing request tokens and remembers the
/// latest one per binding, so only the newest response is ever rendered.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    next_token: u64,
    latest: HashMap<usize, u64>,
}

impl RequestSequencer {
    pub fn issue(&mut self, binding: usize) -> u64 {
        self.next_token += 1;
        self.latest.insert(binding, self.next_token);
        self.next_token
    }

    /// Invalidates every in-flight token of `binding`.
    pub fn supersede(&mut self, binding: usize) {
        self.latest.remove(&binding);
    }

    pub fn is_current(&self, binding: usize, token: u64) -> bool {
        self.latest.get(&binding) == Some(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_fall_back_to_no_designation() -> std::result::Result<(), LookupFailure> {
        let records = parse_contact_persons(
            r#"[
              {"id": 1, "concern_person": "Alice", "designation": "Manager", "mobile_1": "555"},
              {"id": 2, "concern_person": "Bob", "designation": null},
              {"id": "3", "concern_person": "Carol", "designation": ""},
              {"id": 4, "concern_person": "Dan"}
            ]"#,
        )?;
        let labels = records
            .iter()
            .map(|record| (record.id.as_str(), record.option_label()))
            .collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec![
                ("1", "Alice - Manager".to_string()),
                ("2", "Bob - No designation".to_string()),
                ("3", "Carol - No designation".to_string()),
                ("4", "Dan - No designation".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn non_array_payloads_are_failures() {
        let failure = parse_contact_persons(r#"{"error": "Authentication required"}"#);
        assert!(matches!(failure, Err(LookupFailure::Payload(_))));
        let failure = parse_contact_persons(r#"[{"id": true, "concern_person": "X"}]"#);
        assert!(matches!(failure, Err(LookupFailure::Payload(_))));
    }

    #[test]
    fn query_url_encodes_value() {
        let request = LookupRequest {
            token: 1,
            binding: 0,
            url: "/crm/ajax/get-contact-persons/".into(),
            param: "customer_id".into(),
            value: "4 2&x".into(),
        };
        assert_eq!(
            request.query_url(),
            "/crm/ajax/get-contact-persons/?customer_id=4%202%26x"
        );
    }

    #[test]
    fn sequencer_only_honours_latest_token() {
        let mut sequencer = RequestSequencer::default();
        let first = sequencer.issue(0);
        let second = sequencer.issue(0);
        let other = sequencer.issue(1);
        assert!(first < second && second < other);
        assert!(!sequencer.is_current(0, first));
        assert!(sequencer.is_current(0, second));
        assert!(sequencer.is_current(1, other));

        sequencer.supersede(0);
        assert!(!sequencer.is_current(0, second));
        assert!(sequencer.is_current(1, other));
    }

    #[test]
    fn mock_backend_records_calls_and_defaults_to_transport_failure() {
        let mut backend = MockLookupBackend::new();
        let request = LookupRequest {
            token: 1,
            binding: 0,
            url: "/lookup/".into(),
            param: "customer_id".into(),
            value: "7".into(),
        };
        assert!(matches!(
            backend.fetch(&request),
            Err(LookupFailure::Transport(_))
        ));
        backend.set_failure("/lookup/?customer_id=7", LookupFailure::Status(401));
        assert_eq!(backend.fetch(&request), Err(LookupFailure::Status(401)));
        backend.set_response("/lookup/?customer_id=7", "[]");
        assert_eq!(backend.fetch(&request), Ok("[]".to_string()));
        assert_eq!(backend.take_calls().len(), 3);
        assert!(backend.take_calls().is_empty());
    }
}
