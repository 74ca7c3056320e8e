//! FILENAME: tests/common/mod.rs
//! Fixtures for pivot-engine integration tests.

#![allow(dead_code)]

use pivot_engine::{
    encode_key, AggregationType, Dataset, FilterSpec, Granularity, PivotAxisField, PivotConfig,
    ValueField,
};
use serde_json::{json, Value};

/// The three-record sales set used throughout the scenarios.
pub struct SalesFixture;

impl SalesFixture {
    pub fn records() -> Vec<Value> {
        vec![
            json!({"date": "2024-04-01", "amount": 100, "region": "West"}),
            json!({"date": "2024-04-15", "amount": 50, "region": "West"}),
            json!({"date": "2024-05-01", "amount": 75, "region": "East"}),
        ]
    }

    pub fn dataset() -> Dataset {
        Dataset::new(Self::records())
    }
}

/// Vouchers with inventory and ledger entries plus both master collections.
pub struct VoucherFixture;

impl VoucherFixture {
    pub fn dataset() -> Dataset {
        let primary = vec![
            json!({
                "masterid": "V1", "date": "1-Apr-24", "vouchertypename": "Sales",
                "partyledgername": "Acme Traders", "partyledgernameid": "C1", "amount": 1500,
                "allinventoryentries": [
                    {"stockitemname": "Bolt", "stockitemnameid": "S1", "actualqty": "10", "amount": 1000},
                    {"stockitemname": "Nut", "stockitemnameid": "S2", "actualqty": "5", "amount": 500}
                ],
                "ledgerentries": [
                    {"ledgername": "Acme Traders", "ledgernameid": "C1", "amount": -1500},
                    {"ledgername": "Sales Account", "ledgernameid": "L9", "amount": 1500}
                ]
            }),
            json!({
                "masterid": "V2", "date": "20-May-24", "vouchertypename": "Sales",
                "partyledgername": "Bharat Stores", "partyledgernameid": "C2", "amount": 800,
                "allinventoryentries": [
                    {"stockitemname": "Bolt", "stockitemnameid": "S1", "actualqty": "8", "amount": 800}
                ],
                "ledgerentries": [
                    {"ledgername": "Bharat Stores", "ledgernameid": "C2", "amount": -800}
                ]
            }),
            json!({
                "masterid": "V3", "date": "2-Jun-24", "vouchertypename": "Receipt",
                "partyledgername": "Walk-in", "amount": 200
            }),
        ];

        let customers = vec![
            json!({"masterid": "C1", "name": "Acme Traders", "parent": "Sundry Debtors", "state": "Maharashtra"}),
            json!({"masterid": "C2", "name": "Bharat Stores", "parent": "Sundry Debtors", "state": "Gujarat"}),
            json!({"masterid": "L9", "name": "Sales Account", "parent": "Sales Accounts"}),
        ];

        let stockitems = vec![
            json!({"masterid": "S1", "name": "Bolt", "category": "Fasteners", "parent": "Hardware"}),
            json!({"masterid": "S2", "name": "Nut", "category": "Fasteners", "parent": "Hardware"}),
        ];

        Dataset::new(primary)
            .with_customers(customers)
            .with_stockitems(stockitems)
    }
}

pub fn axis(field: &str) -> PivotAxisField {
    PivotAxisField::new(field, field)
}

pub fn month_axis(field: &str) -> PivotAxisField {
    PivotAxisField::new(field, field).with_date_grouping(Granularity::Month)
}

pub fn config(rows: Vec<PivotAxisField>, columns: Vec<PivotAxisField>, values: Vec<ValueField>) -> PivotConfig {
    PivotConfig {
        filters: Vec::new(),
        rows,
        columns,
        values,
    }
}

pub fn with_filters(mut config: PivotConfig, filters: Vec<FilterSpec>) -> PivotConfig {
    config.filters = filters;
    config
}

pub fn sum(field: &str) -> ValueField {
    ValueField::new(field, AggregationType::Sum)
}

pub fn key(parts: &[&str]) -> String {
    encode_key(&parts.iter().map(|s| s.to_string()).collect::<Vec<_>>())
}
