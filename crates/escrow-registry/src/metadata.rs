//! Builds the on-chain `AgentMetadata` datum a mint publishes, from a
//! `RegistryRequest` row (§4.7, §9).

use escrow_core::agent_metadata::{self, AgentMetadata, AgentPricing, StringOrChunks};
use escrow_core::model::{Legal, Pricing, RegistryRequest};

fn atomic(s: &str) -> StringOrChunks {
    StringOrChunks::Atomic(s.to_string())
}

fn convert_pricing(pricing: &Pricing) -> AgentPricing {
    match pricing {
        Pricing::Fixed(fixed) => AgentPricing::Fixed(agent_metadata::FixedPricing {
            amounts: fixed.amounts.clone(),
        }),
        Pricing::Free => AgentPricing::Free,
    }
}

fn convert_legal(legal: &Legal) -> agent_metadata::Legal {
    agent_metadata::Legal {
        privacy_policy: legal.privacy_policy.as_deref().map(atomic),
        terms: legal.terms.as_deref().map(atomic),
        other: legal.other.as_deref().map(atomic),
    }
}

pub fn build_agent_metadata(request: &RegistryRequest) -> AgentMetadata {
    AgentMetadata {
        name: atomic(&request.name),
        api_base_url: atomic(&request.api_base_url),
        author: agent_metadata::Author {
            name: atomic(&request.author.name),
            contact_email: request.author.contact_email.as_deref().map(atomic),
            contact_other: request.author.contact_other.as_deref().map(atomic),
            organization: request.author.organization.as_deref().map(atomic),
        },
        legal: request.legal.as_ref().map(convert_legal),
        tags: request.tags.clone(),
        pricing: convert_pricing(&request.pricing),
        capability: request.capability.clone(),
        example_output: request.example_output.clone(),
        image: request.image.as_deref().map(atomic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_core::model::Author;
    use uuid::Uuid;

    fn sample_request() -> RegistryRequest {
        RegistryRequest {
            id: Uuid::new_v4(),
            state: escrow_core::state::RegistrationState::RegistrationRequested,
            agent_identifier: None,
            pricing: Pricing::Free,
            name: "summarizer".into(),
            api_base_url: "https://example.com/api".into(),
            author: Author {
                name: "alice".into(),
                contact_email: Some("alice@example.com".into()),
                contact_other: None,
                organization: None,
            },
            legal: None,
            tags: vec!["summarization".into()],
            capability: None,
            example_output: None,
            image: None,
            smart_contract_wallet_id: Uuid::nil(),
            payment_source_id: Uuid::nil(),
            created_at: 0,
            updated_at: 0,
            next_action_last_changed_at: 0,
        }
    }

    #[test]
    fn builds_metadata_with_matching_name_and_pricing() {
        let request = sample_request();
        let metadata = build_agent_metadata(&request);
        assert_eq!(metadata.name.resolve(), "summarizer");
        assert!(matches!(metadata.pricing, AgentPricing::Free));
    }
}
