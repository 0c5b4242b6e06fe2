//! Quote admin actions: pricing, quote-link issuance, lifecycle moves
//!
//! Submitting a quote prices its option slots from the reference charts and
//! issues a fresh quote-acceptance token; refreshing recomputes and
//! supersedes the previous token (which keeps a redirect pointer).

use crate::db::BackofficeStorage;
use crate::pricing::{compute_quote_option_prices, CostValues, QuoteComputation};
use crate::tokens::TokenService;
use serde_json::json;
use shared::error::{AppError, AppResult};
use shared::models::{ClarityGroups, DiamondPriceEntry, QuoteStatus, TokenFlavor};
use std::collections::HashMap;

/// Admin action against a quote
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuoteAction {
    Acknowledge,
    /// Price the options, issue a quote link, move to QUOTED
    SubmitQuote,
    /// Recompute all options and supersede the live quote link
    RefreshQuote,
    /// Fill only the option slots that lack a price
    ComputeMissingPrices,
    MarkActioned,
    Drop,
    Edit,
}

impl QuoteAction {
    pub fn parse(action: &str) -> AppResult<QuoteAction> {
        Ok(match action.trim().to_lowercase().as_str() {
            "acknowledge" => QuoteAction::Acknowledge,
            "submit_quote" => QuoteAction::SubmitQuote,
            "refresh_quote" => QuoteAction::RefreshQuote,
            "compute_missing_prices" => QuoteAction::ComputeMissingPrices,
            "mark_actioned" => QuoteAction::MarkActioned,
            "drop" => QuoteAction::Drop,
            "edit" => QuoteAction::Edit,
            other => {
                return Err(AppError::invalid_request(format!(
                    "Unknown quote action: {}",
                    other
                )));
            }
        })
    }

    fn target(&self) -> Option<QuoteStatus> {
        match self {
            QuoteAction::Acknowledge => Some(QuoteStatus::Acknowledged),
            QuoteAction::SubmitQuote | QuoteAction::RefreshQuote => Some(QuoteStatus::Quoted),
            QuoteAction::MarkActioned => Some(QuoteStatus::QuoteActioned),
            QuoteAction::Drop => Some(QuoteStatus::Dropped),
            QuoteAction::ComputeMissingPrices | QuoteAction::Edit => None,
        }
    }

    fn reprices(&self) -> bool {
        matches!(
            self,
            QuoteAction::SubmitQuote | QuoteAction::RefreshQuote | QuoteAction::ComputeMissingPrices
        )
    }
}

/// Result of a successful quote action
#[derive(Debug, Clone, serde::Serialize)]
pub struct QuoteActionOutcome {
    pub request_id: String,
    pub status: QuoteStatus,
    /// Customer-facing quote link, present when a token was issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_summary: Option<String>,
    /// Flat field updates for the admin frontend
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
}

/// Reference data loaded once per computation
pub fn load_pricing_refs(
    storage: &BackofficeStorage,
) -> AppResult<(CostValues, Vec<DiamondPriceEntry>, ClarityGroups)> {
    let costs = CostValues::from_rows(&storage.list_cost_settings()?);
    let entries: Vec<DiamondPriceEntry> = storage
        .list_diamond_entries()?
        .into_iter()
        .map(|(_, entry)| entry)
        .collect();
    let groups = storage.load_clarity_groups()?;
    Ok((costs, entries, groups))
}

/// Apply one admin action to a quote.
///
/// Reference-data failures (missing metal cost, missing diamond band)
/// abort the whole action before any write; the prior record is untouched.
pub fn apply_quote_action(
    storage: &BackofficeStorage,
    tokens: &TokenService,
    request_id: &str,
    action: QuoteAction,
    fields: &HashMap<String, String>,
    note: Option<&str>,
    now: i64,
) -> AppResult<QuoteActionOutcome> {
    let mut quote = storage
        .get_quote(request_id)?
        .ok_or_else(|| AppError::request_not_found(request_id))?;

    for (key, value) in fields {
        quote.apply_field(key, value)?;
    }

    // Validate the transition before doing any expensive work
    if let Some(target) = action.target()
        && !quote.status.can_transition_to(target)
    {
        return Err(AppError::invalid_transition(
            quote.status.as_str(),
            target.as_str(),
        ));
    }

    let mut out_fields = HashMap::new();
    let mut discount_summary = None;
    let mut quote_url = None;

    if action.reprices() {
        let (costs, entries, groups) = load_pricing_refs(storage)?;
        let force = action == QuoteAction::RefreshQuote;
        let QuoteComputation {
            options,
            discount,
            fields: computed_fields,
        } = compute_quote_option_prices(&quote, force, &costs, &entries, &groups)?;

        quote.options = options;
        quote.details.price = quote.options.iter().find_map(|o| o.price_18k);
        discount_summary = Some(discount.summary.clone());
        out_fields = computed_fields;
        quote.append_note(
            &format!("quote options priced ({})", discount.summary),
            now,
        );
    }

    // Issuing the quote link supersedes any previous one; the old token
    // keeps a redirect pointer to the new one.
    if matches!(action, QuoteAction::SubmitQuote | QuoteAction::RefreshQuote) {
        let snapshot = json!({
            "options": quote.options,
            "metals": quote.requested_metals(),
            "discount_summary": discount_summary,
        });
        let issued = tokens.issue(TokenFlavor::QuoteAccept, request_id, snapshot, now)?;
        quote.append_note(&format!("quote link issued: {}", issued.url), now);
        quote_url = Some(issued.url);
    }

    if let Some(target) = action.target() {
        quote.status = target;
        quote.status_updated_at = now;
        quote.append_note(&format!("status → {}", target), now);
    }

    if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
        quote.append_note(note, now);
    }

    storage.upsert_quote(&quote)?;

    tracing::info!(request_id, status = %quote.status, "Quote action applied");

    Ok(QuoteActionOutcome {
        request_id: request_id.to_string(),
        status: quote.status,
        quote_url,
        discount_summary,
        fields: out_fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;
    use shared::models::{CostSettingRow, DiamondPriceEntry, QuoteRecord};

    fn setup() -> (BackofficeStorage, TokenService) {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        let tokens = TokenService::new(storage.clone(), "https://www.example.com");

        storage
            .upsert_cost_setting(&CostSettingRow {
                key: "price_gram_18k".into(),
                value: "80".into(),
                unit: Some("usd/g".into()),
                notes: None,
            })
            .unwrap();
        storage
            .upsert_diamond_entry(
                None,
                &DiamondPriceEntry {
                    clarity: "VS1".into(),
                    color: "F".into(),
                    weight_min: 0.3,
                    weight_max: Some(1.0),
                    price_per_ct: 4000.0,
                    notes: None,
                },
            )
            .unwrap();

        let mut quote = QuoteRecord::new("HW-2001", 0);
        quote.status = QuoteStatus::Acknowledged;
        quote.details.metal = Some("18K Yellow Gold".to_string());
        quote.details.metal_weight = Some(5.0);
        quote.details.stone = Some("Natural Diamond".to_string());
        quote.details.stone_weight = Some(0.5);
        quote.options[0].clarity = Some("VS1".to_string());
        quote.options[0].color = Some("F".to_string());
        storage.upsert_quote(&quote).unwrap();

        (storage, tokens)
    }

    fn act(
        storage: &BackofficeStorage,
        tokens: &TokenService,
        action: QuoteAction,
    ) -> AppResult<QuoteActionOutcome> {
        apply_quote_action(storage, tokens, "HW-2001", action, &HashMap::new(), None, 5_000)
    }

    #[test]
    fn test_submit_quote_prices_and_issues_link() {
        let (storage, tokens) = setup();
        let outcome = act(&storage, &tokens, QuoteAction::SubmitQuote).unwrap();

        assert_eq!(outcome.status, QuoteStatus::Quoted);
        let url = outcome.quote_url.unwrap();
        assert!(url.contains("/quote_confirmation?token="));
        assert_eq!(outcome.fields.get("quote_option_1_price_18k").unwrap(), "2400");

        let quote = storage.get_quote("HW-2001").unwrap().unwrap();
        assert_eq!(quote.options[0].price_18k, Some(2400));
        assert_eq!(quote.details.price, Some(2400));
        assert!(quote.notes.contains("quote link issued"));
    }

    #[test]
    fn test_refresh_supersedes_previous_link() {
        let (storage, tokens) = setup();
        let first = act(&storage, &tokens, QuoteAction::SubmitQuote)
            .unwrap()
            .quote_url
            .unwrap();
        let second = act(&storage, &tokens, QuoteAction::RefreshQuote)
            .unwrap()
            .quote_url
            .unwrap();
        assert_ne!(first, second);

        let first_token = first.rsplit("token=").next().unwrap().to_string();
        let err = tokens
            .peek(TokenFlavor::QuoteAccept, &first_token, 6_000)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Expired);
        assert!(err.details.unwrap().contains_key("redirect_token"));
    }

    #[test]
    fn test_refresh_invalidates_even_selected_tokens() {
        let (storage, tokens) = setup();
        let url = act(&storage, &tokens, QuoteAction::SubmitQuote)
            .unwrap()
            .quote_url
            .unwrap();
        let token = url.rsplit("token=").next().unwrap().to_string();
        tokens
            .resolve(
                TokenFlavor::QuoteAccept,
                &token,
                crate::tokens::TokenAction::Select { option: 1, metal: None, confirm: false },
                5_500,
            )
            .unwrap();

        act(&storage, &tokens, QuoteAction::RefreshQuote).unwrap();
        let err = tokens
            .peek(TokenFlavor::QuoteAccept, &token, 6_000)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Expired);
    }

    #[test]
    fn test_pricing_failure_leaves_quote_untouched() {
        let (storage, tokens) = setup();
        // Break the chart: the only band no longer matches
        let mut quote = storage.get_quote("HW-2001").unwrap().unwrap();
        quote.options[0].clarity = Some("SI2".to_string());
        storage.upsert_quote(&quote).unwrap();
        let before = storage.get_quote("HW-2001").unwrap().unwrap();

        let err = act(&storage, &tokens, QuoteAction::SubmitQuote).unwrap_err();
        assert_eq!(err.code, ErrorCode::DiamondPriceMissing);

        let after = storage.get_quote("HW-2001").unwrap().unwrap();
        assert_eq!(before, after);
        // No token was issued either
        assert!(storage
            .get_indexed_token(TokenFlavor::QuoteAccept, "HW-2001")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_lifecycle_guards() {
        let (storage, tokens) = setup();
        act(&storage, &tokens, QuoteAction::Drop).unwrap();
        let err = act(&storage, &tokens, QuoteAction::SubmitQuote).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);
    }

    #[test]
    fn test_compute_missing_prices_keeps_status() {
        let (storage, tokens) = setup();
        let outcome = act(&storage, &tokens, QuoteAction::ComputeMissingPrices).unwrap();
        assert_eq!(outcome.status, QuoteStatus::Acknowledged);
        assert!(outcome.quote_url.is_none());
        assert_eq!(
            storage
                .get_quote("HW-2001")
                .unwrap()
                .unwrap()
                .options[0]
                .price_18k,
            Some(2400)
        );
    }

    #[test]
    fn test_edit_routes_fields() {
        let (storage, tokens) = setup();
        let fields: HashMap<String, String> = [
            ("quote_option_2_clarity".to_string(), "SI1".to_string()),
            ("metal_weight".to_string(), "6".to_string()),
        ]
        .into();
        apply_quote_action(
            &storage,
            &tokens,
            "HW-2001",
            QuoteAction::Edit,
            &fields,
            Some("customer prefers matte finish"),
            5_000,
        )
        .unwrap();

        let quote = storage.get_quote("HW-2001").unwrap().unwrap();
        assert_eq!(quote.options[1].clarity.as_deref(), Some("SI1"));
        assert_eq!(quote.details.metal_weight, Some(6.0));
        assert!(quote.notes.contains("matte finish"));
    }
}
