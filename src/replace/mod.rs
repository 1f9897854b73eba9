//! Database-wide search-replace, run after a dump import to rewrite
//! hostnames and paths that were copied over from the source environment.
//!
//! Discovers tables and columns through `information_schema`, walks every
//! text column page by page, and rewrites cells through
//! [`serialized::rewrite_value`] so PHP-serialized payloads keep valid byte
//! lengths. Updates are keyed by primary key; tables without one are skipped
//! and surfaced in the report.

pub mod serialized;

pub use serialized::rewrite_value;

use sqlx::{MySqlConnection, Row};

/// Rows fetched per page while scanning a table.
const PAGE_SIZE: i64 = 1_000;

const TEXT_TYPES: &[&str] = &["char", "varchar", "tinytext", "text", "mediumtext", "longtext"];

/// Outcome of one search-replace pass.
#[derive(Debug, Default)]
pub struct ReplaceReport {
    pub tables_scanned: usize,
    /// Tables holding text columns but no primary key; nothing to key an
    /// UPDATE on, so they are left untouched.
    pub tables_skipped: usize,
    pub cells_changed: u64,
    pub errors: Vec<String>,
}

struct TablePlan {
    table: String,
    key_columns: Vec<String>,
    text_columns: Vec<String>,
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn select_sql(plan: &TablePlan) -> String {
    let mut columns: Vec<String> = plan
        .key_columns
        .iter()
        .map(|c| format!("CAST({} AS CHAR)", quote_ident(c)))
        .collect();
    columns.extend(plan.text_columns.iter().map(|c| quote_ident(c)));

    let order: Vec<String> = plan.key_columns.iter().map(|c| quote_ident(c)).collect();

    format!(
        "SELECT {} FROM {} ORDER BY {} LIMIT ? OFFSET ?",
        columns.join(", "),
        quote_ident(&plan.table),
        order.join(", ")
    )
}

fn update_sql(plan: &TablePlan, column: &str) -> String {
    let conditions: Vec<String> = plan
        .key_columns
        .iter()
        .map(|c| format!("{} = ?", quote_ident(c)))
        .collect();

    format!(
        "UPDATE {} SET {} = ? WHERE {}",
        quote_ident(&plan.table),
        quote_ident(column),
        conditions.join(" AND ")
    )
}

async fn table_plans(conn: &mut MySqlConnection) -> Result<(Vec<TablePlan>, usize), sqlx::Error> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT TABLE_NAME FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
         ORDER BY TABLE_NAME",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut plans = Vec::new();
    let mut skipped = 0;

    for table in tables {
        let columns = sqlx::query(
            "SELECT COLUMN_NAME, DATA_TYPE, COLUMN_KEY FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
             ORDER BY ORDINAL_POSITION",
        )
        .bind(&table)
        .fetch_all(&mut *conn)
        .await?;

        let mut key_columns = Vec::new();
        let mut text_columns = Vec::new();
        for column in &columns {
            let name: String = column.try_get("COLUMN_NAME")?;
            let data_type: String = column.try_get("DATA_TYPE")?;
            let column_key: String = column.try_get("COLUMN_KEY")?;

            if column_key == "PRI" {
                key_columns.push(name.clone());
            }
            if TEXT_TYPES.contains(&data_type.to_ascii_lowercase().as_str()) {
                text_columns.push(name);
            }
        }

        if text_columns.is_empty() {
            continue;
        }
        if key_columns.is_empty() {
            log::warn!("skipping table `{table}`: text columns but no primary key");
            skipped += 1;
            continue;
        }

        plans.push(TablePlan {
            table,
            key_columns,
            text_columns,
        });
    }

    Ok((plans, skipped))
}

async fn scan_table(
    conn: &mut MySqlConnection,
    plan: &TablePlan,
    search: &str,
    replace: &str,
    report: &mut ReplaceReport,
) {
    let select = select_sql(plan);
    let updates: Vec<String> = plan
        .text_columns
        .iter()
        .map(|column| update_sql(plan, column))
        .collect();
    let mut offset: i64 = 0;

    loop {
        let rows = match sqlx::query(&select)
            .bind(PAGE_SIZE)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                report
                    .errors
                    .push(format!("failed to scan table `{}`: {err}", plan.table));
                return;
            }
        };
        let page_len = rows.len();

        for row in &rows {
            let mut key_values = Vec::with_capacity(plan.key_columns.len());
            for idx in 0..plan.key_columns.len() {
                match row.try_get::<String, _>(idx) {
                    Ok(value) => key_values.push(value),
                    Err(err) => {
                        report
                            .errors
                            .push(format!("unreadable key in table `{}`: {err}", plan.table));
                        key_values.clear();
                        break;
                    }
                }
            }
            if key_values.len() != plan.key_columns.len() {
                continue;
            }

            for (text_idx, column) in plan.text_columns.iter().enumerate() {
                let cell: Option<String> =
                    match row.try_get(plan.key_columns.len() + text_idx) {
                        Ok(cell) => cell,
                        Err(err) => {
                            report.errors.push(format!(
                                "unreadable cell `{}`.`{}`: {err}",
                                plan.table, column
                            ));
                            continue;
                        }
                    };
                let Some(old) = cell else { continue };

                let new = rewrite_value(&old, search, replace);
                if new == old {
                    continue;
                }

                let mut update = sqlx::query(&updates[text_idx]).bind(&new);
                for key in &key_values {
                    update = update.bind(key);
                }

                match update.execute(&mut *conn).await {
                    Ok(_) => report.cells_changed += 1,
                    Err(err) => report.errors.push(format!(
                        "failed to update `{}`.`{}`: {err}",
                        plan.table, column
                    )),
                }
            }
        }

        if (page_len as i64) < PAGE_SIZE {
            return;
        }
        offset += PAGE_SIZE;
    }
}

/// Rewrite `search` to `replace` across every text column of the connected
/// database. Row-level problems are collected in the report rather than
/// aborting the pass; a failure to read the schema itself is an error.
pub async fn search_replace(
    conn: &mut MySqlConnection,
    search: &str,
    replace: &str,
) -> Result<ReplaceReport, sqlx::Error> {
    let (plans, skipped) = table_plans(conn).await?;

    let mut report = ReplaceReport {
        tables_skipped: skipped,
        ..ReplaceReport::default()
    };

    for plan in &plans {
        log::info!(
            "search-replace scanning `{}` ({} text columns)",
            plan.table,
            plan.text_columns.len()
        );
        scan_table(conn, plan, search, replace, &mut report).await;
        report.tables_scanned += 1;
    }

    log::info!(
        "search-replace finished: {} tables scanned, {} cells changed, {} errors",
        report.tables_scanned,
        report.cells_changed,
        report.errors.len()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> TablePlan {
        TablePlan {
            table: "wp_options".to_owned(),
            key_columns: vec!["option_id".to_owned()],
            text_columns: vec!["option_name".to_owned(), "option_value".to_owned()],
        }
    }

    #[test]
    fn select_orders_by_key_and_pages() {
        assert_eq!(
            select_sql(&plan()),
            "SELECT CAST(`option_id` AS CHAR), `option_name`, `option_value` \
             FROM `wp_options` ORDER BY `option_id` LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn update_targets_one_cell_by_key() {
        assert_eq!(
            update_sql(&plan(), "option_value"),
            "UPDATE `wp_options` SET `option_value` = ? WHERE `option_id` = ?"
        );
    }

    #[test]
    fn composite_keys_produce_compound_conditions() {
        let plan = TablePlan {
            table: "wp_term_relationships".to_owned(),
            key_columns: vec!["object_id".to_owned(), "term_taxonomy_id".to_owned()],
            text_columns: vec!["notes".to_owned()],
        };

        assert_eq!(
            update_sql(&plan, "notes"),
            "UPDATE `wp_term_relationships` SET `notes` = ? \
             WHERE `object_id` = ? AND `term_taxonomy_id` = ?"
        );
    }

    #[test]
    fn identifiers_with_backticks_are_escaped() {
        assert_eq!(quote_ident("odd`name"), "`odd``name`");
    }
}
