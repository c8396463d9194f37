//! Parquet candle cache

use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use super::DataError;
use crate::feed::{normalize_candles, Candle, Interval};

const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Candle schema; prices stored as strings for Decimal precision
pub fn candle_schema() -> Schema {
    let mut fields = vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("symbol", DataType::Utf8, false),
    ];
    for name in PRICE_COLUMNS {
        fields.push(Field::new(name, DataType::Utf8, false));
    }
    Schema::new(fields)
}

/// Writes candle series to Parquet files
pub struct CandleWriter {
    output_dir: PathBuf,
}

impl CandleWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(&self) -> Result<(), DataError> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// `<dir>/<SYMBOL>_<interval>_<first>_<last>.parquet`
    pub fn file_path(&self, symbol: &str, interval: Interval, candles: &[Candle]) -> PathBuf {
        let stamp = |c: Option<&Candle>| {
            c.map_or_else(
                || "empty".to_string(),
                |c| c.timestamp.format("%Y%m%d").to_string(),
            )
        };
        let filename = format!(
            "{}_{}_{}_{}.parquet",
            symbol,
            interval,
            stamp(candles.first()),
            stamp(candles.last())
        );
        self.output_dir.join(filename)
    }

    /// Write one symbol's candles, returning the file path
    pub fn write(
        &self,
        symbol: &str,
        interval: Interval,
        candles: &[Candle],
    ) -> Result<PathBuf, DataError> {
        let path = self.file_path(symbol, interval, candles);
        self.write_to(&path, symbol, candles)?;
        Ok(path)
    }

    pub fn write_to(
        &self,
        path: &Path,
        symbol: &str,
        candles: &[Candle],
    ) -> Result<(), DataError> {
        self.ensure_dir()?;

        let schema = Arc::new(candle_schema());
        let file = File::create(path)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        let timestamps: Vec<i64> = candles
            .iter()
            .map(|c| c.timestamp.timestamp_micros())
            .collect();
        let symbols: Vec<&str> = vec![symbol; candles.len()];
        let column = |f: fn(&Candle) -> Decimal| -> ArrayRef {
            let values: Vec<String> = candles.iter().map(|c| f(c).to_string()).collect();
            Arc::new(StringArray::from(values))
        };

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC"))
                    as ArrayRef,
                Arc::new(StringArray::from(symbols)) as ArrayRef,
                column(|c| c.open),
                column(|c| c.high),
                column(|c| c.low),
                column(|c| c.close),
                column(|c| c.volume),
            ],
        )?;

        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = candles.len(), "Wrote candles to Parquet");

        Ok(())
    }
}

/// Reader for candle Parquet files
pub struct CandleReader {
    path: PathBuf,
}

impl CandleReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Candles per symbol, each series normalized
    pub fn read(&self) -> Result<BTreeMap<String, Vec<Candle>>, DataError> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut by_symbol: BTreeMap<String, Vec<Candle>> = BTreeMap::new();

        for batch_result in reader {
            let batch = batch_result?;

            let timestamps = batch
                .column(0)
                .as_any()
                .downcast_ref::<TimestampMicrosecondArray>()
                .ok_or(DataError::Schema("timestamp"))?;
            let symbols = batch
                .column(1)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or(DataError::Schema("symbol"))?;
            let mut prices = Vec::with_capacity(5);
            for idx in 2..7 {
                let col = batch
                    .column(idx)
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or(DataError::Schema(PRICE_COLUMNS[idx - 2]))?;
                prices.push(col);
            }

            for i in 0..batch.num_rows() {
                let micros = timestamps.value(i);
                let timestamp = DateTime::from_timestamp_micros(micros)
                    .ok_or(DataError::Timestamp(micros))?;
                let value = |col: usize| Decimal::from_str(prices[col].value(i));

                by_symbol
                    .entry(symbols.value(i).to_string())
                    .or_default()
                    .push(Candle::new(
                        timestamp,
                        value(0)?,
                        value(1)?,
                        value(2)?,
                        value(3)?,
                        value(4)?,
                    ));
            }
        }

        Ok(by_symbol
            .into_iter()
            .map(|(symbol, candles)| (symbol, normalize_candles(candles)))
            .collect())
    }

    /// Candles of one symbol; empty when the file has none
    pub fn read_symbol(&self, symbol: &str) -> Result<Vec<Candle>, DataError> {
        Ok(self.read()?.remove(symbol).unwrap_or_default())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
