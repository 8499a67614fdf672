//! End-to-end settlement scenarios.
//!
//! Runs pasted party and loot logs through the full pipeline against the
//! in-memory market and checks totals, transfers, liquidation plans and
//! the degradation paths.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_test::{assert_err, assert_ok};

    use crate::mock_market::{Endpoint, StaticMarket};
    use lootsplit::config::ValuationConfig;
    use lootsplit::engine::Settler;
    use lootsplit::error::SettlementError;
    use lootsplit::parser::{parse_loot_log, parse_roster};
    use lootsplit::report::render_report;
    use lootsplit::types::*;

    const PARTY_LOG: &str = "\
Session data: From 2024-05-01, 18:02:11 to 2024-05-01, 19:32:40
Session: 01:30h
Loot Type: Market
Loot: 7,119
Supplies: 420,000
Balance: -412,881
067 Parcel Macius (Leader)
    Loot: 6,750
    Supplies: 300,000
    Balance: -293,250
    Damage: 3,120,400
    Healing: 402,112
Eryn
    Loot: 369
    Supplies: 120,000
    Balance: -119,631
    Damage: 1,004,233
    Healing: 88,010
Tobi
    Loot: 0
    Supplies: 0
    Balance: 0
    Damage: 0
    Healing: 0
";

    const PARCEL_LOOT: &str = "\
Session data: From 2024-05-01, 18:02:11 to 2024-05-01, 19:32:40
Looted Items:
  3x item x
  150x gold coins
  2x platinum coins
";

    const ERYN_LOOT: &str = "Looted Items: 9x a gold coin 4x rope 1x mystery idol 10x dragon hams";

    const TOBI_LOOT: &str = "Looted Items: None";

    fn logs() -> Vec<(String, String)> {
        vec![
            ("Parcel Macius".to_string(), PARCEL_LOOT.to_string()),
            ("eryn".to_string(), ERYN_LOOT.to_string()),
            ("Tobi".to_string(), TOBI_LOOT.to_string()),
        ]
    }

    fn settler(market: Arc<StaticMarket>) -> Settler {
        Settler::new(market, ValuationConfig::default())
    }

    /// What each delta has left after applying every transfer.
    fn residuals(result: &SettlementResult) -> Vec<Gold> {
        result
            .participants
            .iter()
            .map(|p| {
                let paid: Gold = result.transfers.iter().filter(|t| t.from == p.name).map(|t| t.amount).sum();
                let received: Gold = result.transfers.iter().filter(|t| t.to == p.name).map(|t| t.amount).sum();
                p.delta - paid + received
            })
            .collect()
    }

    // -- Parsing scenarios --

    #[test]
    fn test_collapsed_single_line_loot() {
        assert_eq!(parse_loot_log("9x a gold coin"), vec![LootLine::new("gold coin", 9)]);
    }

    #[test]
    fn test_indexed_header_name() {
        let roster = parse_roster("067 Parcel Macius\n    Supplies: 5,000\n");
        assert_eq!(
            roster,
            vec![RosterEntry { name: "Parcel Macius".into(), supplies_cost: 5_000 }]
        );
    }

    #[test]
    fn test_adjacent_headers_keep_their_own_supplies() {
        let roster = parse_roster("Ghost\nEryn\n  Supplies: 5,000\n");
        assert_eq!(roster, vec![RosterEntry { name: "Eryn".into(), supplies_cost: 5_000 }]);
    }

    #[test]
    fn test_party_log_roster() {
        let roster = parse_roster(PARTY_LOG);
        let names: Vec<_> = roster.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Parcel Macius", "Eryn", "Tobi"]);
        assert_eq!(roster[0].supplies_cost, 300_000);
        assert_eq!(roster[2].supplies_cost, 0);
    }

    // -- Full runs --

    #[tokio::test]
    async fn test_two_player_coin_loss() {
        let market = Arc::new(StaticMarket::catalogue());
        let roster = vec![
            RosterEntry { name: "A".into(), supplies_cost: 1_000 },
            RosterEntry { name: "B".into(), supplies_cost: 500 },
        ];
        let loot = vec![
            LootSubmission { participant: "A".into(), lines: vec![LootLine::new("gold coin", 10)] },
            LootSubmission { participant: "B".into(), lines: vec![] },
        ];

        let result = assert_ok!(settler(market.clone()).settle(&roster, &loot).await);
        assert_eq!(result.total_held_loot, 10);
        assert_eq!(result.total_supplies, 1_500);
        assert_eq!(result.corrected_net, -1_490);
        assert_eq!(result.equal_share, -745);
        assert_eq!(result.participants[0].fair_payout, 255);
        assert_eq!(result.participants[0].delta, -245);
        assert_eq!(result.participants[1].fair_payout, -245);
        assert_eq!(result.participants[1].delta, 245);
        assert_eq!(
            result.transfers,
            vec![Transfer { from: "B".into(), to: "A".into(), amount: 245 }]
        );
        // coins never reach the market
        assert_eq!(market.calls(Endpoint::Identity), 0);
        assert_eq!(market.calls(Endpoint::Snapshot), 0);
    }

    #[tokio::test]
    async fn test_depth_drives_route() {
        let market = Arc::new(StaticMarket::catalogue());
        let roster = vec![RosterEntry { name: "Solo".into(), supplies_cost: 0 }];
        let loot = vec![LootSubmission {
            participant: "Solo".into(),
            lines: vec![LootLine::new("item x", 3)],
        }];

        let result = assert_ok!(settler(market).settle(&roster, &loot).await);
        let plan = result.plan_for("solo").unwrap();
        assert_eq!(plan.market.len(), 1);
        let sell = &plan.market[0];
        assert_eq!(sell.market_total, 6_400);
        assert_eq!(sell.npc_total, 6_000);
        assert_eq!(sell.chosen_total, 6_400);
        assert_eq!(
            sell.used_levels,
            vec![FilledLevel { price: 2_200, quantity: 1 }, FilledLevel { price: 2_100, quantity: 2 }]
        );
        assert_eq!(result.total_held_loot, 6_400);
    }

    #[tokio::test]
    async fn test_full_party_settlement() {
        let market = Arc::new(StaticMarket::catalogue());
        let result = assert_ok!(settler(market.clone()).settle_text(PARTY_LOG, &logs()).await);

        assert_eq!(result.total_held_loot, 7_119);
        assert_eq!(result.total_supplies, 420_000);
        assert_eq!(result.corrected_net, -412_881);
        assert_eq!(result.equal_share, -137_627);
        assert_eq!(result.remainder(), 0);

        let deltas: Vec<_> = result.participants.iter().map(|p| p.delta).collect();
        assert_eq!(deltas, vec![-155_623, 17_996, 137_627]);
        // no loot and no supplies: delta is exactly minus the share
        assert_eq!(result.participant("tobi").unwrap().delta, -result.equal_share);

        assert_eq!(
            result.transfers,
            vec![
                Transfer { from: "Eryn".into(), to: "Parcel Macius".into(), amount: 17_996 },
                Transfer { from: "Tobi".into(), to: "Parcel Macius".into(), amount: 137_627 },
            ]
        );

        let eryn = result.plan_for("Eryn").unwrap();
        let npc: Vec<_> = eryn.npc.iter().map(|s| (s.item_name.as_str(), s.chosen_total)).collect();
        assert_eq!(npc, vec![("dragon hams", 300), ("rope", 60)]);
        assert!(eryn.npc.iter().all(|s| s.best_vendor.as_deref() == Some("Rashid")));
        assert_eq!(eryn.unmatched, vec![UnmatchedLine { item_name: "mystery idol".into(), quantity: 1 }]);
        assert!(eryn.market.is_empty());

        assert_eq!(result.unmatched_item_names, vec!["mystery idol".to_string()]);
        assert!(result.degraded.is_empty());
        assert_eq!(result.as_of.map(|t| t.timestamp()), Some(1_700_000_000));

        // one batched snapshot, depth once per tradeable distinct item
        assert_eq!(market.calls(Endpoint::Snapshot), 1);
        assert_eq!(market.calls(Endpoint::Depth), 3);

        let report = render_report(&result);
        assert!(report.contains("Tobi -> Parcel Macius: 137,627"));
        assert!(report.contains("1x mystery idol"));
    }

    #[tokio::test]
    async fn test_runs_are_deterministic() {
        let first = settler(Arc::new(StaticMarket::catalogue()))
            .settle_text(PARTY_LOG, &logs())
            .await
            .unwrap();
        let second = settler(Arc::new(StaticMarket::catalogue()))
            .settle_text(PARTY_LOG, &logs())
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_coin_only_runs_are_deterministic() {
        let run = || async {
            settler(Arc::new(StaticMarket::catalogue()))
                .settle_text("A\nSupplies: 1,000\nB\nSupplies: 500\n", &[
                    ("A".to_string(), "Looted Items: 10x gold coin".to_string()),
                    ("B".to_string(), TOBI_LOOT.to_string()),
                ])
                .await
                .unwrap()
        };
        let first = run().await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = run().await;
        assert_eq!(first.as_of, None);
        assert_eq!(first, second);
        assert!(render_report(&first).starts_with("Settlement (no market prices used)"));
    }

    #[tokio::test]
    async fn test_supply_override_replaces_logged_value() {
        let market = Arc::new(StaticMarket::catalogue());
        let result = assert_ok!(
            settler(market)
                .settle_text_with_overrides(PARTY_LOG, &logs(), &[("tobi".to_string(), 30_000)])
                .await
        );
        assert_eq!(result.total_supplies, 450_000);
        assert_eq!(result.participant("Tobi").unwrap().supplies_cost, 30_000);
    }

    #[tokio::test]
    async fn test_loot_past_gold_range_is_rejected() {
        let market = Arc::new(StaticMarket::catalogue());
        let solo = vec![(
            "Solo".to_string(),
            "Looted Items:\n10000000000000000000x gold coin".to_string(),
        )];
        let err = assert_err!(settler(market.clone()).settle_text("Solo\n Supplies: 0\n", &solo).await);
        assert_eq!(err, SettlementError::AmountOverflow("gold coin".into()));

        let hoard = "Looted Items:\n1000000000000000x crystal coin".to_string();
        let pair = vec![("A".to_string(), hoard.clone()), ("B".to_string(), hoard)];
        let err = assert_err!(
            settler(market)
                .settle_text("A\n Supplies: 0\nB\n Supplies: 0\n", &pair)
                .await
        );
        assert!(matches!(err, SettlementError::AmountOverflow(_)));
    }

    #[tokio::test]
    async fn test_conservation_across_party_sizes() {
        let market = Arc::new(StaticMarket::catalogue());
        let cases: Vec<Vec<(Gold, u64)>> = vec![
            vec![(1_000, 7), (0, 0), (333, 91)],
            vec![(0, 100), (0, 0), (0, 0)],
            vec![(12_345, 6_789), (98, 0), (0, 44_444), (7_777, 1), (5, 5)],
            vec![(0, 1), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
            vec![(50_000, 0)],
        ];

        for case in cases {
            let n = case.len() as Gold;
            let roster: Vec<_> = case
                .iter()
                .enumerate()
                .map(|(i, (supplies, _))| RosterEntry { name: format!("P{i}"), supplies_cost: *supplies })
                .collect();
            let loot: Vec<_> = case
                .iter()
                .enumerate()
                .map(|(i, (_, coins))| LootSubmission {
                    participant: format!("P{i}"),
                    lines: vec![LootLine::new("gold coin", *coins)],
                })
                .collect();

            let result = settler(market.clone()).settle(&roster, &loot).await.unwrap();

            let delta_sum: Gold = result.participants.iter().map(|p| p.delta).sum();
            assert_eq!(delta_sum, result.remainder());
            assert!((0..n).contains(&delta_sum));

            let payers = result.participants.iter().filter(|p| p.delta > 0).count();
            let receivers = result.participants.iter().filter(|p| p.delta < 0).count();
            assert!(result.transfers.len() <= (payers + receivers).saturating_sub(1));
            assert!(result.transfers.iter().all(|t| t.amount > 0));
            for left in residuals(&result) {
                assert!((0..n).contains(&left), "residual {left} out of range");
            }
        }
    }

    // -- Failure and degradation paths --

    #[tokio::test]
    async fn test_missing_paste_lists_everyone() {
        let market = Arc::new(StaticMarket::catalogue());
        let partial = vec![("Eryn".to_string(), ERYN_LOOT.to_string())];
        let err = assert_err!(settler(market.clone()).settle_text(PARTY_LOG, &partial).await);
        match err {
            SettlementError::MissingLootSubmission { missing } => {
                assert_eq!(missing, vec!["Parcel Macius".to_string(), "Tobi".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        // nothing is valued for an incomplete party
        assert_eq!(market.calls(Endpoint::Identity), 0);
    }

    #[tokio::test]
    async fn test_empty_party_log() {
        let market = Arc::new(StaticMarket::catalogue());
        let err = assert_err!(settler(market).settle_text("nothing to see here", &[]).await);
        assert!(matches!(err, SettlementError::EmptyRoster));
    }

    #[tokio::test]
    async fn test_identity_outage_aborts() {
        let market = Arc::new(StaticMarket::catalogue());
        market.fail(Endpoint::Identity);
        let err = assert_err!(settler(market).settle_text(PARTY_LOG, &logs()).await);
        assert!(matches!(err, SettlementError::MarketUnavailable(_)));
    }

    #[tokio::test]
    async fn test_depth_outage_falls_back_to_top_of_book() {
        let market = Arc::new(StaticMarket::catalogue());
        market.fail(Endpoint::Depth);
        let result = assert_ok!(settler(market).settle_text(PARTY_LOG, &logs()).await);

        assert!(result
            .degraded
            .iter()
            .all(|d| d.reason == Degradation::DepthUnavailable));
        assert_eq!(result.degraded.len(), 3);

        // top-of-book 2200 × 3 beats the vendor's 6000
        let parcel = result.plan_for("Parcel Macius").unwrap();
        assert_eq!(parcel.market[0].market_total, 6_600);
        assert!(parcel.market[0].used_levels.is_empty());
    }

    #[tokio::test]
    async fn test_market_outage_values_at_vendor_prices() {
        let market = Arc::new(StaticMarket::catalogue());
        market.fail(Endpoint::Depth);
        market.fail(Endpoint::Snapshot);
        let result = assert_ok!(settler(market).settle_text(PARTY_LOG, &logs()).await);

        assert!(result
            .degraded
            .iter()
            .all(|d| d.reason == Degradation::MarketUnavailable));
        let parcel = result.plan_for("Parcel Macius").unwrap();
        assert!(parcel.market.is_empty());
        assert_eq!(parcel.npc[0].chosen_total, 6_000);
        assert_eq!(result.participant("Parcel Macius").unwrap().held_loot_value, 6_350);
    }

    #[tokio::test]
    async fn test_top_of_book_only_config() {
        let market = Arc::new(StaticMarket::catalogue());
        let settler = Settler::new(
            market.clone(),
            ValuationConfig { use_depth: false, ..ValuationConfig::default() },
        );
        let roster = vec![RosterEntry { name: "Solo".into(), supplies_cost: 0 }];
        let loot = vec![LootSubmission {
            participant: "Solo".into(),
            lines: vec![LootLine::new("giant shimmering pearl", 2)],
        }];

        let result = assert_ok!(settler.settle(&roster, &loot).await);
        assert_eq!(result.total_held_loot, 18_000);
        assert_eq!(market.calls(Endpoint::Depth), 0);
    }
}
