/*
 *     Copyright 2025 The Homepanel Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use clap::Parser;
use homepanel::publisher;
use homepanel::report::{MetricsRecord, Report};
use homepanel_config::sampler;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Debug, Parser)]
#[command(
    name = "hpstat",
    author,
    version,
    about = "hpstat prints the latest report of hpsampler",
    long_about = "Reads the report published by hpsampler under a shared lock and prints it \
    as a table, or as json for scripts."
)]
struct Args {
    #[arg(
        short = 'p',
        long = "path",
        default_value_os_t = sampler::default_report_path(),
        help = "Specify the report file to read"
    )]
    path: PathBuf,

    #[arg(
        long = "json",
        default_value_t = false,
        help = "Specify whether to print the raw json report"
    )]
    json: bool,
}

/// TableMetrics is the table row of a metrics record.
#[derive(Debug, Default, Tabled)]
#[tabled(rename_all = "UPPERCASE")]
struct TableMetrics {
    cpu: String,
    memory: String,
    upload: String,
    download: String,
    #[tabled(rename = "SESSION UPLOADED")]
    session_uploaded: String,
    #[tabled(rename = "SESSION DOWNLOADED")]
    session_downloaded: String,
    #[tabled(rename = "SESSION TOTAL")]
    session_total: String,
    #[tabled(rename = "BILLING PERIOD TOTAL")]
    billing_period_total: String,
}

impl From<MetricsRecord> for TableMetrics {
    fn from(record: MetricsRecord) -> Self {
        TableMetrics {
            cpu: format!("{:.1}%", record.cpu_percent),
            memory: format!("{:.1}%", record.memory_percent),
            upload: record.upload_rate,
            download: record.download_rate,
            session_uploaded: record.session_uploaded,
            session_downloaded: record.session_downloaded,
            session_total: record.session_total,
            // Billing is disabled outside of the cloud.
            billing_period_total: record
                .billing_period_total
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments.
    let args = Args::parse();

    let Some(report) = publisher::read(&args.path) else {
        println!("no data available");
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report {
        Report::Metrics(record) => {
            // Create a table and print it.
            let mut table = Table::new(vec![TableMetrics::from(record)]);
            table
                .with(Style::blank())
                .with(Modify::new(Rows::first()).with(Alignment::center()));
            println!("{table}");
        }
        Report::Error { error } => {
            eprintln!("hpsampler failed: {}", error);
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use homepanel::rate::RateResult;

    #[test]
    fn table_row_from_record() {
        let rates = RateResult {
            upload_bps: 250.0,
            download_bps: 300.0,
            session_uploaded_bytes: 500,
            session_downloaded_bytes: 600,
        };

        let row = TableMetrics::from(MetricsRecord::new(12.34, 56.78, &rates, None));
        assert_eq!(row.cpu, "12.3%");
        assert_eq!(row.memory, "56.8%");
        assert_eq!(row.upload, "250 B/s");
        assert_eq!(row.billing_period_total, "-");

        let row = TableMetrics::from(MetricsRecord::new(0.0, 0.0, &rates, Some(0)));
        assert_eq!(row.billing_period_total, "0 B");
    }
}
