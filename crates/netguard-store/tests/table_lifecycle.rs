use netguard_store::Store;

#[tokio::test]
async fn collector_table_lifecycle() {
    let store = Store::open_in_memory().await.unwrap();
    let registry = store.registry();

    let table = registry.create("tcpdump").await.unwrap();
    assert!(table.starts_with("tcpdump_"));

    sqlx::query(&format!(
        "INSERT INTO \"{table}\" (timestamp, src_ip, dest_ip, protocol) VALUES (datetime('now'), '192.168.1.5', '8.8.8.8', 'tcp')"
    ))
    .execute(store.pool())
    .await
    .unwrap();

    let latest = registry.latest("tcpdump").await.unwrap();
    assert_eq!(latest.as_deref(), Some(table.as_str()));

    let row: (String,) = sqlx::query_as(&format!("SELECT src_ip FROM \"{table}\" LIMIT 1"))
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(row.0, "192.168.1.5");

    registry.drop_table(&table).await.unwrap();
    assert_eq!(registry.latest("tcpdump").await.unwrap(), None);
}

#[tokio::test]
async fn suricata_event_type_tables_are_independent() {
    let store = Store::open_in_memory().await.unwrap();
    let registry = store.registry();

    let alert_table = registry.create("suricata_alert").await.unwrap();
    let dns_table = registry.create("suricata_dns").await.unwrap();

    assert_eq!(registry.latest("suricata_alert").await.unwrap(), Some(alert_table));
    assert_eq!(registry.latest("suricata_dns").await.unwrap(), Some(dns_table));
}
