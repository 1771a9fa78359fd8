mod common;

use common::{article, daily_bars, day, run_config, FixtureSource};
use sentiment_forecast::eda::{render_table, summarize};
use sentiment_forecast::macro_indicators::IndicatorSet;
use sentiment_forecast::pipeline::build_feature_table;

#[test]
fn summary_covers_prices_sentiment_and_label_balance() {
    let bars = daily_bars(&[10.0, 12.0, 11.0, 15.0, 14.0]);
    let articles = vec![
        article(day(0), 0.5, 100),
        article(day(0), -0.5, 100),
        article(day(2), 0.8, 300),
    ];
    let source = FixtureSource::default().with_company("wba", bars, articles);
    let table = build_feature_table("wba", &run_config(&["wba"], 6), &source, &source, &IndicatorSet::default())
        .unwrap();

    let s = summarize(&table).unwrap();
    assert_eq!(s.lowest_price, Some(10.0));
    assert_eq!(s.highest_price, Some(15.0));
    assert!((s.average_price.unwrap() - 12.4).abs() < 1e-12);
    // zero-filled days count toward the sentiment mean
    assert_eq!(s.lowest_sentiment, Some(0.0));
    assert_eq!(s.highest_sentiment, Some(0.8));
    assert!((s.average_sentiment.unwrap() - 0.8 / 6.0).abs() < 1e-12);
    assert_eq!(s.articles_analyzed, 3);
    assert_eq!(s.analyzed_bpe_tokens, 500);
    // up, down, up, down over four labeled days
    assert_eq!(s.buy_percentage, Some(0.5));
    assert_eq!(s.sell_percentage, Some(0.5));

    let rendered = render_table(&[s]);
    assert_eq!(rendered.lines().count(), 2);
    assert!(rendered.lines().nth(1).unwrap().starts_with("wba"));
}
