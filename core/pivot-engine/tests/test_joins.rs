//! FILENAME: tests/test_joins.rs
//! Recomputation across vouchers, repeating groups and master data.

mod common;

use common::{axis, config, key, month_axis, sum, with_filters, VoucherFixture};
use pivot_engine::{
    recompute, AggregationType, Collection, FilterSpec, PivotSession, Relationship, ValueField,
    TOTAL_KEY,
};

#[test]
fn test_customer_join_by_party_id() {
    let cfg = config(vec![axis("customers.parent")], vec![], vec![sum("amount")]);
    let result = recompute(&VoucherFixture::dataset(), &[], &cfg).unwrap();

    assert_eq!(result.row_keys, vec![key(&["Sundry Debtors"]), key(&["(blank)"])]);
    assert_eq!(result.row_total(&key(&["Sundry Debtors"]), "amount_sum"), Some(2300.0));
    assert_eq!(result.row_total(&key(&["(blank)"]), "amount_sum"), Some(200.0));
}

#[test]
fn test_stock_join_expands_inventory_entries() {
    let cfg = config(
        vec![axis("stockitems.category")],
        vec![],
        vec![sum("allinventoryentries.amount")],
    );
    let result = recompute(&VoucherFixture::dataset(), &[], &cfg).unwrap();

    assert_eq!(result.row_keys, vec![key(&["Fasteners"]), key(&["(blank)"])]);
    assert_eq!(result.row_total(&key(&["Fasteners"]), "allinventoryentries.amount_sum"), Some(2300.0));
    assert_eq!(result.row_total(&key(&["(blank)"]), "allinventoryentries.amount_sum"), Some(0.0));
}

#[test]
fn test_ledger_entries_switch_customer_join() {
    let cfg = config(vec![axis("customers.parent")], vec![], vec![sum("ledgerentries.amount")]);
    let result = recompute(&VoucherFixture::dataset(), &[], &cfg).unwrap();

    assert_eq!(
        result.row_keys,
        vec![key(&["Sales Accounts"]), key(&["Sundry Debtors"]), key(&["(blank)"])]
    );
    assert_eq!(result.row_total(&key(&["Sundry Debtors"]), "ledgerentries.amount_sum"), Some(-2300.0));
    assert_eq!(result.row_total(&key(&["Sales Accounts"]), "ledgerentries.amount_sum"), Some(1500.0));
}

#[test]
fn test_user_relationship_wins() {
    let user = [Relationship::new("partyledgername", Collection::Customers, "name")];
    let cfg = config(vec![axis("customers.state")], vec![], vec![sum("amount")]);
    let result = recompute(&VoucherFixture::dataset(), &user, &cfg).unwrap();

    assert_eq!(
        result.row_keys,
        vec![key(&["Gujarat"]), key(&["Maharashtra"]), key(&["(blank)"])]
    );
    assert_eq!(result.row_total(&key(&["Maharashtra"]), "amount_sum"), Some(1500.0));
}

#[test]
fn test_filter_on_reference_field() {
    let cfg = with_filters(
        config(vec![axis("vouchertypename")], vec![], vec![sum("amount")]),
        vec![FilterSpec::new("customers.parent", ["Sundry Debtors"])],
    );
    let result = recompute(&VoucherFixture::dataset(), &[], &cfg).unwrap();

    assert_eq!(result.row_keys, vec![key(&["Sales"])]);
    assert_eq!(result.grand("amount_sum"), 2300.0);
}

#[test]
fn test_synonym_request() {
    let cfg = config(vec![axis("customer")], vec![], vec![sum("amount")]);
    let result = recompute(&VoucherFixture::dataset(), &[], &cfg).unwrap();
    assert_eq!(
        result.row_keys,
        vec![key(&["Acme Traders"]), key(&["Bharat Stores"]), key(&["Walk-in"])]
    );
}

#[test]
fn test_distinct_items_per_voucher_type() {
    let cfg = config(
        vec![axis("vouchertypename")],
        vec![],
        vec![ValueField::new("allinventoryentries.stockitemname", AggregationType::DistinctCount)],
    );
    let result = recompute(&VoucherFixture::dataset(), &[], &cfg).unwrap();
    let value_key = "allinventoryentries.stockitemname_distinctCount";

    assert_eq!(result.cell(&key(&["Sales"]), TOTAL_KEY, value_key), Some(2.0));
    assert_eq!(result.cell(&key(&["Receipt"]), TOTAL_KEY, value_key), Some(0.0));
}

#[test]
fn test_tally_style_dates_bucket_by_month() {
    let cfg = config(vec![month_axis("date")], vec![axis("vouchertypename")], vec![sum("amount")]);
    let result = recompute(&VoucherFixture::dataset(), &[], &cfg).unwrap();

    assert_eq!(result.row_keys, vec![key(&["Apr-24"]), key(&["May-24"]), key(&["Jun-24"])]);
    assert_eq!(result.col_keys, vec![key(&["Receipt"]), key(&["Sales"])]);
    assert_eq!(result.cell(&key(&["Jun-24"]), &key(&["Receipt"]), "amount_sum"), Some(200.0));
}

#[test]
fn test_session_publishes_latest_result() {
    let session = PivotSession::new();
    let dataset = VoucherFixture::dataset();
    let cfg = config(vec![axis("vouchertypename")], vec![], vec![sum("amount")]);

    let published = session.recompute(&dataset, &[], &cfg).unwrap().unwrap();
    assert_eq!(published.grand("amount_sum"), 2500.0);
    assert_eq!(session.latest_version(), Some(1));

    let stale = session.begin();
    let newer = session.begin();
    assert!(session.publish(stale, (*published).clone()).is_none());
    let accepted = session.publish(newer, (*published).clone()).unwrap();
    assert!(std::sync::Arc::ptr_eq(&accepted, &session.latest().unwrap()));
}
