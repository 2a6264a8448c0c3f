// Inpage script <-> wallet messaging contract. The event names and the
// single string payload field on each detail struct are consumed by an
// injected script that is deployed separately; they are wire-frozen and
// must never be renamed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomEventName {
    #[serde(rename = "stacksAuthenticationRequest")]
    AuthenticationRequest,
    #[serde(rename = "signatureRequest")]
    SignatureRequest,
    #[serde(rename = "structuredDataSignatureRequest")]
    StructuredDataSignatureRequest,
    #[serde(rename = "stacksTransactionRequest")]
    TransactionRequest,
    #[serde(rename = "profileUpdateRequest")]
    ProfileUpdateRequest,
}

impl DomEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomEventName::AuthenticationRequest => "stacksAuthenticationRequest",
            DomEventName::SignatureRequest => "signatureRequest",
            DomEventName::StructuredDataSignatureRequest => "structuredDataSignatureRequest",
            DomEventName::TransactionRequest => "stacksTransactionRequest",
            DomEventName::ProfileUpdateRequest => "profileUpdateRequest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationRequestEventDetails {
    #[serde(rename = "authenticationRequest")]
    pub authentication_request: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequestEventDetails {
    #[serde(rename = "signatureRequest")]
    pub signature_request: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDataSignatureRequestEventDetails {
    #[serde(rename = "structuredDataSignatureRequest")]
    pub structured_data_signature_request: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequestEventDetails {
    #[serde(rename = "transactionRequest")]
    pub transaction_request: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdateRequestEventDetails {
    #[serde(rename = "profileUpdateRequest")]
    pub profile_update_request: String,
}

// A custom event as it crosses the isolated-script boundary: the event
// name plus the matching single-field detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "detail")]
pub enum InpageEvent {
    #[serde(rename = "stacksAuthenticationRequest")]
    AuthenticationRequest(AuthenticationRequestEventDetails),
    #[serde(rename = "signatureRequest")]
    SignatureRequest(SignatureRequestEventDetails),
    #[serde(rename = "structuredDataSignatureRequest")]
    StructuredDataSignatureRequest(StructuredDataSignatureRequestEventDetails),
    #[serde(rename = "stacksTransactionRequest")]
    TransactionRequest(TransactionRequestEventDetails),
    #[serde(rename = "profileUpdateRequest")]
    ProfileUpdateRequest(ProfileUpdateRequestEventDetails),
}

impl InpageEvent {
    pub fn name(&self) -> DomEventName {
        match self {
            InpageEvent::AuthenticationRequest(_) => DomEventName::AuthenticationRequest,
            InpageEvent::SignatureRequest(_) => DomEventName::SignatureRequest,
            InpageEvent::StructuredDataSignatureRequest(_) => {
                DomEventName::StructuredDataSignatureRequest
            }
            InpageEvent::TransactionRequest(_) => DomEventName::TransactionRequest,
            InpageEvent::ProfileUpdateRequest(_) => DomEventName::ProfileUpdateRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_wire_exact() {
        assert_eq!(
            serde_json::to_string(&DomEventName::AuthenticationRequest).unwrap(),
            "\"stacksAuthenticationRequest\""
        );
        assert_eq!(
            serde_json::to_string(&DomEventName::SignatureRequest).unwrap(),
            "\"signatureRequest\""
        );
        assert_eq!(
            serde_json::to_string(&DomEventName::StructuredDataSignatureRequest).unwrap(),
            "\"structuredDataSignatureRequest\""
        );
        assert_eq!(
            serde_json::to_string(&DomEventName::TransactionRequest).unwrap(),
            "\"stacksTransactionRequest\""
        );
        assert_eq!(
            serde_json::to_string(&DomEventName::ProfileUpdateRequest).unwrap(),
            "\"profileUpdateRequest\""
        );
        assert_eq!(
            DomEventName::TransactionRequest.as_str(),
            "stacksTransactionRequest"
        );
    }

    #[test]
    fn payload_fields_are_wire_exact() {
        let detail = TransactionRequestEventDetails {
            transaction_request: "payload".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&detail).unwrap(),
            r#"{"transactionRequest":"payload"}"#
        );

        let detail = AuthenticationRequestEventDetails {
            authentication_request: "payload".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&detail).unwrap(),
            r#"{"authenticationRequest":"payload"}"#
        );

        let detail = StructuredDataSignatureRequestEventDetails {
            structured_data_signature_request: "payload".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&detail).unwrap(),
            r#"{"structuredDataSignatureRequest":"payload"}"#
        );

        let detail = SignatureRequestEventDetails {
            signature_request: "payload".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&detail).unwrap(),
            r#"{"signatureRequest":"payload"}"#
        );

        let detail = ProfileUpdateRequestEventDetails {
            profile_update_request: "payload".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&detail).unwrap(),
            r#"{"profileUpdateRequest":"payload"}"#
        );
    }

    #[test]
    fn events_decode_from_the_injected_script_shape() {
        let raw = r#"{"event":"stacksTransactionRequest","detail":{"transactionRequest":"eyJ0eXAi"}}"#;
        let event: InpageEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.name(), DomEventName::TransactionRequest);
        match &event {
            InpageEvent::TransactionRequest(detail) => {
                assert_eq!(detail.transaction_request, "eyJ0eXAi");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let raw = r#"{"event":"signatureRequest","detail":{"signatureRequest":"payload"}}"#;
        let event: InpageEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.name(), DomEventName::SignatureRequest);

        let raw = r#"{"event":"stacksAuthenticationRequest","detail":{"authenticationRequest":"payload"}}"#;
        let event: InpageEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.name(), DomEventName::AuthenticationRequest);

        let raw = r#"{"event":"structuredDataSignatureRequest","detail":{"structuredDataSignatureRequest":"payload"}}"#;
        let event: InpageEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.name(), DomEventName::StructuredDataSignatureRequest);

        let raw = r#"{"event":"profileUpdateRequest","detail":{"profileUpdateRequest":"payload"}}"#;
        let event: InpageEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.name(), DomEventName::ProfileUpdateRequest);
    }

    #[test]
    fn a_mismatched_detail_field_is_rejected() {
        // the field name must match the event name exactly
        let raw = r#"{"event":"signatureRequest","detail":{"transactionRequest":"payload"}}"#;
        assert!(serde_json::from_str::<InpageEvent>(raw).is_err());
    }

    #[test]
    fn event_names_round_trip_through_serde() {
        for name in [
            DomEventName::AuthenticationRequest,
            DomEventName::SignatureRequest,
            DomEventName::StructuredDataSignatureRequest,
            DomEventName::TransactionRequest,
            DomEventName::ProfileUpdateRequest,
        ] {
            let encoded = serde_json::to_string(&name).unwrap();
            let decoded: DomEventName = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, name);
        }
    }
}
