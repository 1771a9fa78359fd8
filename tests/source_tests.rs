use chrono::NaiveDate;

use sentiment_forecast::config::DataConfig;
use sentiment_forecast::macro_indicators::INDICATOR_SERIES;
use sentiment_forecast::source::{
    read_indicator_csv, CsvSource, IndicatorSource, PriceSource, SentimentSource,
};

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, m, day).unwrap()
}

fn data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("financial_data")).unwrap();
    std::fs::create_dir_all(dir.path().join("sentiment_data")).unwrap();
    dir
}

#[test]
/// Provider exports carry a time and offset on each date and a
/// "Stock Splits" header.
fn reads_provider_price_export() {
    let dir = data_dir();
    std::fs::write(
        dir.path().join("financial_data").join("wmt.csv"),
        "Date,Open,High,Low,Close,Volume,Dividends,Stock Splits\n\
         2018-12-31 00:00:00-05:00,30.0,31.0,29.5,30.5,1000,0.0,0.0\n\
         2019-01-02 00:00:00-05:00,31.0,32.0,30.5,31.5,1200,0.0,0.0\n\
         2019-01-03 00:00:00-05:00,31.5,33.0,31.0,32.5,1500,0.12,0.0\n",
    )
    .unwrap();

    let source = CsvSource::new(DataConfig {
        data_dir: dir.path().to_path_buf(),
    });
    let bars = source.load_prices("wmt", d(1, 1), d(1, 31)).unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].date, d(1, 2));
    assert_eq!(bars[1].close, Some(32.5));
    assert_eq!(bars[1].dividends, Some(0.12));
    assert_eq!(bars[1].stock_splits, Some(0.0));
}

#[test]
fn missing_price_file_is_an_error() {
    let dir = data_dir();
    let source = CsvSource::new(DataConfig {
        data_dir: dir.path().to_path_buf(),
    });
    assert!(source.load_prices("lulu", d(1, 1), d(1, 31)).is_err());
}

#[test]
fn reads_per_article_sentiment() {
    let dir = data_dir();
    std::fs::write(
        dir.path().join("sentiment_data").join("dltr_sent.csv"),
        "date,tokens,text_sentiment,text_error,text_input_tokens,daily_article_count,daily_token_sum\n\
         2019-01-02,120,0.4,0.1,260,14,3000\n\
         2019-01-02,80,-0.2,0.3,150,14,3000\n\
         2019-01-05,50,0.9,0.05,90,3,700\n",
    )
    .unwrap();

    let source = CsvSource::new(DataConfig {
        data_dir: dir.path().to_path_buf(),
    });
    let articles = source.load_articles("dltr").unwrap();
    assert_eq!(articles.len(), 3);
    assert_eq!(articles[1].text_input_tokens, 150);
    assert_eq!(articles[2].date, d(1, 5));
}

#[test]
/// Blank cells are "no observation"; every requested series must exist.
fn reads_wide_indicator_export() {
    let dir = data_dir();
    let header = format!("Date,{}", INDICATOR_SERIES.join(","));
    let row = |date: &str, cells: [&str; 8]| format!("{},{}", date, cells.join(","));
    let body = [
        header.clone(),
        row("2019-01-01", ["252.4", "14000", "200.1", "135.2", "110.3", "4.0", "75.1", ""]),
        row("2019-01-02", ["", "", "", "", "", "", "", "2510.03"]),
        row("2019-02-01", ["253.0", "", "", "", "", "3.9", "", "2706.53"]),
    ]
    .join("\n");
    std::fs::write(dir.path().join("financial_data").join("external_indicators.csv"), body).unwrap();

    let source = CsvSource::new(DataConfig {
        data_dir: dir.path().to_path_buf(),
    });
    let set = source.load_indicators(&INDICATOR_SERIES, d(1, 1), d(1, 31)).unwrap();
    assert_eq!(set.series("SP500").collect::<Vec<_>>(), vec![(d(1, 2), 2510.03)]);
    assert_eq!(set.series("UNRATE").count(), 1);
    assert_eq!(set.len(), 8);

    let err = read_indicator_csv(
        &dir.path().join("financial_data").join("external_indicators.csv"),
        &["DGS10"],
        d(1, 1),
        d(1, 31),
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("DGS10"));
}

#[test]
/// Only the latest observation before the range is kept, to seed the fill.
fn indicator_reader_keeps_latest_earlier_observation() {
    let dir = data_dir();
    let header = format!("Date,{}", INDICATOR_SERIES.join(","));
    let row = |date: &str, cells: [&str; 8]| format!("{},{}", date, cells.join(","));
    let body = [
        header,
        row("2018-12-01", ["", "", "", "", "", "3.8", "", ""]),
        row("2018-10-01", ["", "", "", "", "108.0", "", "", ""]),
        row("2018-07-01", ["", "", "", "", "107.2", "", "", ""]),
        row("2019-01-01", ["", "", "", "", "", "4.0", "", ""]),
        row("2019-02-01", ["", "", "", "", "", "3.9", "", ""]),
    ]
    .join("\n");
    let path = dir.path().join("financial_data").join("external_indicators.csv");
    std::fs::write(&path, body).unwrap();

    let set = read_indicator_csv(&path, &INDICATOR_SERIES, d(1, 1), d(1, 31)).unwrap();
    let gdp: Vec<_> = set.series("GDPDEF").collect();
    assert_eq!(gdp, vec![(NaiveDate::from_ymd_opt(2018, 10, 1).unwrap(), 108.0)]);
    let mut unrate: Vec<_> = set.series("UNRATE").collect();
    unrate.sort_by_key(|(date, _)| *date);
    assert_eq!(
        unrate,
        vec![(NaiveDate::from_ymd_opt(2018, 12, 1).unwrap(), 3.8), (d(1, 1), 4.0)]
    );
    assert_eq!(set.len(), 3);
}
