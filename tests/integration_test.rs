//! End-to-end tests over synthetic price panels.
//!
//! Tests cover:
//! - Two-symbol trend scenario: the trending symbol is scored above the flat one
//! - Fixed-weight, zero-cost backtest matches weighted raw returns exactly
//! - Tied scores produce a net-zero book
//! - Full pipeline through the ports with a mock data source
//! - No look-ahead: rewriting future prices leaves past scores and pnl intact
//! - Retrain cadence on the default schedule

mod common;

use common::*;
use lsquant::cli::run_backtest_pipeline;
use lsquant::domain::backtest::simulate;
use lsquant::domain::config::PipelineConfig;
use lsquant::domain::config_validation::validate;
use lsquant::domain::error::{LsquantError, Stage};
use lsquant::domain::features::Signal;
use lsquant::domain::panel::Panel;
use lsquant::domain::pipeline::run_pipeline;
use lsquant::domain::portfolio::{PortfolioParams, WeightingScheme, construct};
use lsquant::domain::walk_forward::{RetrainSchedule, ScoreRecord};
use std::path::Path;

mod trend_scenario {
    use super::*;

    /// A flat at 100, B rising by 1 per day.
    fn flat_and_rising() -> Panel {
        let rows = (0..30).map(|t| vec![100.0, 100.0 + t as f64]).collect();
        Panel::new(days(30), vec!["A".into(), "B".into()], rows).unwrap()
    }

    fn two_symbol_config(panel: &Panel) -> PipelineConfig {
        PipelineConfig {
            universe: panel.symbols().to_vec(),
            start_date: panel.dates()[0],
            end_date: *panel.dates().last().unwrap(),
            lookback: 5,
            min_history: 5,
            signals: Signal::CORE.to_vec(),
            train_window: 10,
            retrain_freq: 5,
            long_frac: 0.5,
            short_frac: 0.5,
            min_symbols: 2,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn rising_symbol_scores_higher() {
        let panel = flat_and_rising();
        let output = run_pipeline(&panel, &two_symbol_config(&panel)).unwrap();

        let mut checked = 0;
        for pair in output.scores.chunks(2) {
            assert_eq!(pair.len(), 2);
            assert_eq!(pair[0].date, pair[1].date);
            let (a, b) = (&pair[0], &pair[1]);
            assert_eq!((a.symbol.as_str(), b.symbol.as_str()), ("A", "B"));
            assert!(b.score > a.score, "B not above A on {}", a.date);
            checked += 1;
        }
        assert!(checked > 0);
    }

    #[test]
    fn book_is_long_rising_short_flat() {
        let panel = flat_and_rising();
        let output = run_pipeline(&panel, &two_symbol_config(&panel)).unwrap();
        let w = &output.weights;
        let a = w.symbol_index("A").unwrap();
        let b = w.symbol_index("B").unwrap();
        for i in 0..w.len() {
            assert!(w.row(i)[b] > 0.0);
            assert!(w.row(i)[a] < 0.0);
            assert!((w.row(i)[a] + w.row(i)[b]).abs() < 1e-12);
        }
        // first scored date is min_history + train_window into the panel
        assert_eq!(w.dates()[0], panel.dates()[15]);
    }

    #[test]
    fn zero_alpha_is_rejected_before_running() {
        let panel = flat_and_rising();
        let config = PipelineConfig {
            alpha: 0.0,
            ..two_symbol_config(&panel)
        };
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, LsquantError::ConfigInvalid { key, .. } if key == "alpha"));
    }

    #[test]
    fn tiny_alpha_survives_collinear_features() {
        // With two symbols every z-scored feature is +-1, so the columns are collinear.
        let panel = flat_and_rising();
        let config = PipelineConfig {
            alpha: 1e-6,
            ..two_symbol_config(&panel)
        };
        validate(&config).unwrap();
        let output = run_pipeline(&panel, &config).unwrap();
        assert!(!output.scores.is_empty());
        assert!(output.scores.iter().all(|r| r.score.is_finite()));
    }

    #[test]
    fn equal_weighting_gives_half_each() {
        let panel = flat_and_rising();
        let config = PipelineConfig {
            weighting: WeightingScheme::EqualWeight,
            ..two_symbol_config(&panel)
        };
        let output = run_pipeline(&panel, &config).unwrap();
        for row in output.weights.rows() {
            assert!((row[0] + 0.5).abs() < 1e-12);
            assert!((row[1] - 0.5).abs() < 1e-12);
        }
    }
}

mod fixed_weight_backtest {
    use super::*;

    #[test]
    fn zero_cost_pnl_is_weighted_return() {
        let prices = random_walk_panel(4, 40, 7);
        let w = vec![0.4, -0.1, 0.3, -0.2];
        let weights =
            Panel::new(vec![prices.dates()[0]], prices.symbols().to_vec(), vec![w.clone()])
                .unwrap();

        let bt = simulate(&prices, &weights, 0.0, 0.0).unwrap();
        assert_eq!(bt.len(), prices.len());

        let mut equity = 1.0;
        for t in 0..prices.len() {
            let expected = if t == 0 {
                0.0
            } else {
                w.iter()
                    .zip(prices.row(t).iter().zip(prices.row(t - 1)))
                    .map(|(wj, (p, q))| wj * (p / q - 1.0))
                    .sum()
            };
            assert_eq!(bt.daily_pnl[t], expected, "pnl differs at {t}");
            equity *= 1.0 + expected;
            assert_eq!(bt.equity_curve[t], equity);
        }
        assert!(bt.costs.iter().all(|&c| c == 0.0));
        assert!(bt.turnover.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn costs_reduce_pnl_after_rebalance() {
        let prices = random_walk_panel(3, 20, 11);
        let dates = prices.dates();
        let weights = Panel::new(
            vec![dates[0], dates[5]],
            prices.symbols().to_vec(),
            vec![vec![0.5, -0.5, 0.0], vec![-0.5, 0.5, 0.0]],
        )
        .unwrap();
        let free = simulate(&prices, &weights, 0.0, 0.0).unwrap();
        let paid = simulate(&prices, &weights, 3.0, 2.0).unwrap();

        assert!((free.turnover[5] - 2.0).abs() < 1e-12);
        for t in 0..prices.len() {
            let diff = free.daily_pnl[t] - paid.daily_pnl[t];
            let expected = if t == 6 { 2.0 * 5e-4 } else { 0.0 };
            assert!((diff - expected).abs() < 1e-15, "t={t} diff={diff}");
        }
    }
}

mod tied_scores {
    use super::*;

    #[test]
    fn all_equal_scores_net_to_zero() {
        let d = date(2024, 5, 1);
        let scores: Vec<ScoreRecord> = symbols(10)
            .into_iter()
            .map(|symbol| ScoreRecord {
                date: d,
                symbol,
                score: 0.3,
            })
            .collect();

        for weighting in [WeightingScheme::EqualWeight, WeightingScheme::ScoreProportional] {
            let params = PortfolioParams::default().with_weighting(weighting);
            let w = construct(&scores, &params).unwrap();
            let row = w.row(0);
            let net: f64 = row.iter().sum();
            let gross: f64 = row.iter().map(|x| x.abs()).sum();
            assert!(net.abs() < 1e-12, "{weighting}: net {net}");
            assert!((gross - 1.0).abs() < 1e-12);

            let held: Vec<f64> = row.iter().copied().filter(|x| *x != 0.0).collect();
            assert_eq!(held.len(), 4);
            assert!(held.iter().all(|x| (x.abs() - 0.25).abs() < 1e-12));
        }
    }
}

mod full_pipeline {
    use super::*;

    #[test]
    fn synthetic_run_produces_finite_stats() {
        let panel = random_walk_panel(12, 160, 42);
        let config = small_config(&panel);
        let output = run_pipeline(&panel, &config).unwrap();

        let s = &output.stats;
        for v in [s.cagr, s.ann_vol, s.sharpe, s.max_drawdown, s.total_return] {
            assert!(v.is_finite());
        }
        assert!(s.max_drawdown <= 0.0);
        assert_eq!(s.num_days, output.backtest.len());
        assert_eq!(output.features.names.len(), 5);

        for row in output.weights.rows() {
            let net: f64 = row.iter().sum();
            let gross: f64 = row.iter().map(|x| x.abs()).sum();
            assert!(net.abs() < 1e-9);
            assert!((gross - 1.0).abs() < 1e-9);
        }
        assert!(output.activity.avg_turnover >= 0.0);
        assert!(output.activity.total_costs >= 0.0);
    }

    #[test]
    fn scores_sorted_by_date_then_symbol() {
        let panel = random_walk_panel(8, 120, 3);
        let output = run_pipeline(&panel, &small_config(&panel)).unwrap();
        assert!(
            output
                .scores
                .windows(2)
                .all(|p| (p[0].date, &p[0].symbol) < (p[1].date, &p[1].symbol))
        );
    }

    #[test]
    fn repeated_runs_are_identical() {
        let panel = random_walk_panel(8, 120, 5);
        let config = small_config(&panel);
        let a = run_pipeline(&panel, &config).unwrap();
        let b = run_pipeline(&panel, &config).unwrap();
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.backtest, b.backtest);
    }

    #[test]
    fn runs_through_ports() {
        let panel = random_walk_panel(10, 140, 9);
        let config = small_config(&panel);
        let port = MockPriceDataPort::new(panel);
        let report = RecordingReportPort::default();

        let output = run_backtest_pipeline(&port, &report, &config, Path::new("out")).unwrap();

        assert_eq!(port.requests.borrow().len(), 1);
        assert_eq!(port.requests.borrow()[0], config.universe);
        let writes = report.writes.borrow();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, Path::new("out"));
        assert_eq!(writes[0].1, output.backtest.len());
    }

    #[test]
    fn data_errors_propagate() {
        let port = MockPriceDataPort::failing("disk on fire");
        let report = RecordingReportPort::default();
        let err = run_backtest_pipeline(&port, &report, &PipelineConfig::default(), Path::new("out"))
            .unwrap_err();
        assert!(matches!(err, LsquantError::Data { .. }));
        assert!(report.writes.borrow().is_empty());
    }

    #[test]
    fn short_history_is_insufficient() {
        let panel = random_walk_panel(6, 20, 1);
        let err = run_pipeline(&panel, &small_config(&panel)).unwrap_err();
        assert!(matches!(
            err,
            LsquantError::InsufficientData {
                stage: Stage::Features,
                ..
            }
        ));
    }

    #[test]
    fn train_window_longer_than_history_is_empty_score_set() {
        let panel = random_walk_panel(6, 80, 2);
        let config = PipelineConfig {
            train_window: 500,
            ..small_config(&panel)
        };
        let err = run_pipeline(&panel, &config).unwrap_err();
        assert!(matches!(err, LsquantError::EmptyScoreSet { .. }));
    }

    #[test]
    fn unknown_model_fails_before_training() {
        let panel = random_walk_panel(6, 120, 2);
        let config = PipelineConfig {
            model_kind: "gbm".into(),
            ..small_config(&panel)
        };
        let err = run_pipeline(&panel, &config).unwrap_err();
        assert!(matches!(err, LsquantError::UnsupportedModel { kind } if kind == "gbm"));
    }
}

mod look_ahead {
    use super::*;

    /// Multiply every price after `cutoff` by a symbol-dependent factor.
    fn poison_after(panel: &Panel, cutoff: usize) -> Panel {
        let rows = (0..panel.len())
            .map(|t| {
                panel
                    .row(t)
                    .iter()
                    .enumerate()
                    .map(|(j, p)| {
                        if t > cutoff {
                            p * if j % 2 == 0 { 3.0 } else { 0.2 }
                        } else {
                            *p
                        }
                    })
                    .collect()
            })
            .collect();
        Panel::new(panel.dates().to_vec(), panel.symbols().to_vec(), rows).unwrap()
    }

    #[test]
    fn future_prices_do_not_leak_into_past() {
        let clean = random_walk_panel(10, 150, 17);
        let cutoff = 120;
        let poisoned = poison_after(&clean, cutoff);
        let cutoff_date = clean.dates()[cutoff];
        let config = small_config(&clean);

        let a = run_pipeline(&clean, &config).unwrap();
        let b = run_pipeline(&poisoned, &config).unwrap();

        let past = |s: &&ScoreRecord| s.date <= cutoff_date;
        let a_past: Vec<&ScoreRecord> = a.scores.iter().filter(past).collect();
        let b_past: Vec<&ScoreRecord> = b.scores.iter().filter(past).collect();
        assert!(!a_past.is_empty());
        assert_eq!(a_past, b_past);

        let n_past = a.backtest.dates.iter().filter(|d| **d <= cutoff_date).count();
        assert!(n_past > 0);
        assert_eq!(a.backtest.daily_pnl[..n_past], b.backtest.daily_pnl[..n_past]);
        assert_eq!(a.backtest.equity_curve[..n_past], b.backtest.equity_curve[..n_past]);
    }
}

mod retrain_cadence {
    use super::*;

    #[test]
    fn default_schedule_retrains_every_21_after_252() {
        let points = RetrainSchedule::new(252, 21).retrain_points(400);
        assert_eq!(points[0], 252);
        assert!(points.windows(2).all(|w| w[1] - w[0] == 21));
        assert_eq!(*points.last().unwrap(), 252 + 21 * 7);
    }
}
