//! Shared input-format checks for CreatePayment/CreatePurchase (§4.3).

use escrow_core::error::OrchestratorError;

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn validate_agent_identifier(agent_identifier: &str) -> Result<(), OrchestratorError> {
    if agent_identifier.len() < 57 || !is_hex(agent_identifier) {
        return Err(OrchestratorError::invalid_argument(
            "agentIdentifier must be hex and at least 57 characters (policyId || assetName)",
        ));
    }
    Ok(())
}

pub fn validate_input_hash(input_hash: &str) -> Result<(), OrchestratorError> {
    if input_hash.len() != 64 || !is_hex(input_hash) {
        return Err(OrchestratorError::invalid_argument("inputHash must be 64 hex characters"));
    }
    Ok(())
}

pub fn validate_identifier_from_purchaser(identifier_from_purchaser: &str) -> Result<(), OrchestratorError> {
    let len = identifier_from_purchaser.len();
    if !(14..=26).contains(&len) || !is_hex(identifier_from_purchaser) {
        return Err(OrchestratorError::invalid_argument(
            "identifierFromPurchaser must be hex, between 14 and 26 characters",
        ));
    }
    Ok(())
}

/// `agentIdentifier[0..56]`, the minting-policy id prefix (§4.3).
pub fn policy_id_of(agent_identifier: &str) -> &str {
    &agent_identifier[0..56]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_identifier_must_be_at_least_57_hex_chars() {
        assert!(validate_agent_identifier(&"a".repeat(56)).is_err());
        assert!(validate_agent_identifier(&"a".repeat(57)).is_ok());
        assert!(validate_agent_identifier("zz").is_err());
    }

    #[test]
    fn identifier_from_purchaser_length_bounds() {
        assert!(validate_identifier_from_purchaser(&"a".repeat(13)).is_err());
        assert!(validate_identifier_from_purchaser(&"a".repeat(14)).is_ok());
        assert!(validate_identifier_from_purchaser(&"a".repeat(26)).is_ok());
        assert!(validate_identifier_from_purchaser(&"a".repeat(27)).is_err());
    }
}
