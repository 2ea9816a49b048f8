use futures_ledger::engine::{PositionFilter, PositionStatus};
use futures_ledger::replay::{self, ReplayError};
use futures_ledger::{Asset, Decimal, Direction, Pair, PositionController, PositionKey};
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str = "exchange,asset,pair,side,order_id,price,amount,fee,leverage,time_ns\n";

fn write_csv(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(HEADER.as_bytes()).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

#[test]
fn test_replay_file_builds_positions_across_keys() {
    // Rows deliberately out of time order.
    let file = write_csv(&[
        "Binance,perpetual_swap,BTC-USDT,sell,b2,110,1,1,5,2000",
        "okx,futures,ETH-USDT,sell,e1,2000,3,0,1,1500",
        "Binance,perpetual_swap,BTC-USDT,buy,b1,100,1,1,5,1000",
        "Binance,perpetual_swap,BTC-USDT,buy,b3,120,2,0,10,3000",
    ]);

    let controller = PositionController::new();
    let summary = replay::replay_file(&controller, file.path()).unwrap();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.tracked, 4);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.keys, 2);

    let btc = PositionKey::new("binance", Asset::PerpetualSwap, Pair::new("BTC", "USDT"));
    let positions = controller.positions_for(&btc).unwrap();
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].status, PositionStatus::Closed);
    assert_eq!(positions[0].realised_pnl, d("8"));
    assert_eq!(positions[1].status, PositionStatus::Open);
    assert_eq!(positions[1].leverage, d("10"));
    assert_eq!(controller.realised_pnl(&btc).unwrap(), d("8"));

    let eth = controller
        .open_position(&PositionFilter {
            exchange: Some("okx".to_string()),
            ..PositionFilter::default()
        })
        .unwrap();
    assert_eq!(eth.latest_direction, Direction::Short);
    assert_eq!(eth.latest_size, d("3"));
}

#[test]
fn test_replay_counts_rejected_fills() {
    let file = write_csv(&[
        "binance,futures,BTC-USDT,buy,1,100,1,0,1,1000",
        "binance,spot,BTC-USDT,buy,2,100,1,0,1,2000",
        "binance,futures,BTC-USDT,buy,3,100,1,0,1,0",
    ]);

    let controller = PositionController::new();
    let summary = replay::replay_file(&controller, file.path()).unwrap();
    assert_eq!(summary.tracked, 1);
    assert_eq!(summary.rejected, 2);
}

#[test]
fn test_replay_missing_file() {
    let controller = PositionController::new();
    let err = replay::replay_file(&controller, "/nonexistent/fills.csv").unwrap_err();
    assert!(matches!(err, ReplayError::Io(_)));
}

#[test]
fn test_replay_malformed_row_aborts() {
    let file = write_csv(&["binance,futures,BTC-USDT,buy,1,100,1,0,1,not_a_time"]);
    let controller = PositionController::new();
    let err = replay::replay_file(&controller, file.path()).unwrap_err();
    assert!(matches!(err, ReplayError::Csv(_)));
    assert!(controller.keys().is_empty());
}
