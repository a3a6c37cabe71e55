use passage_index::{
    Document, Index, IndexConfig, IndexReader, OpenMode, SearchError, evaluate, parse,
    query::QueryTree,
};
use proptest::prelude::*;

fn passage(id: &str, text: &str, url: &str) -> Document {
    Document::builder()
        .token("passage_ID", id)
        .text("passage_text", text)
        .text("url", url)
        .build()
}

fn index_with(documents: Vec<Document>) -> Index {
    let index = Index::create_in_ram(IndexConfig::default()).unwrap();
    let mut writer = index.writer(OpenMode::Create).unwrap();
    for document in documents {
        writer.add_document(document).unwrap();
    }
    writer.commit().unwrap();
    index
}

fn ids(reader: &IndexReader, query: &str, fields: &[&str]) -> Vec<String> {
    reader
        .searcher()
        .search(query, fields, 10)
        .unwrap()
        .hits
        .into_iter()
        .map(|hit| hit.document.get("passage_ID").unwrap().to_string())
        .collect()
}

#[test]
fn how_long_matches_only_the_first_passage() {
    let index = index_with(vec![
        passage("1", "how long do you need", "http://a"),
        passage("2", "what is the time limit", "http://b"),
    ]);
    let searcher = index.reader().unwrap().searcher();
    let results = searcher.search("how long", &["passage_text"], 10).unwrap();
    assert_eq!(results.total_hits, 1);
    let hits = results.hits;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.get("passage_ID"), Some("1"));
    assert_eq!(hits[0].document.get("url"), Some("http://a"));
    assert!(hits[0].score > 0.0);
}

#[test]
fn empty_commit_is_queryable() {
    let index = index_with(Vec::new());
    let reader = index.reader().unwrap();
    assert_eq!(reader.num_docs(), 0);
    for query in ["anything", "\"a phrase\"", "url:x*", "+a -b"] {
        assert!(ids(&reader, query, &["passage_text"]).is_empty());
    }
}

#[test]
fn unmatched_term_is_an_empty_result() {
    let index = index_with(vec![passage("1", "red apple", "http://a")]);
    let reader = index.reader().unwrap();
    assert!(ids(&reader, "zebra", &["passage_text"]).is_empty());
    assert!(ids(&reader, "nosuchfield:apple", &["passage_text"]).is_empty());
}

#[test]
fn ranking_is_deterministic() {
    let texts = [
        "apple pie recipe",
        "apple apple orchard",
        "banana bread",
        "pie crust without apple",
        "apple",
        "green apple and red apple",
    ];
    let documents = texts
        .iter()
        .enumerate()
        .map(|(i, text)| passage(&i.to_string(), text, "http://x"))
        .collect();
    let index = index_with(documents);
    let reader = index.reader().unwrap();
    let tree = parse("apple pie", &["passage_text"]).unwrap();
    let first = evaluate(&tree, &reader, 4).unwrap();
    assert_eq!(first.total_hits, 5);
    let first = first.hits;
    for _ in 0..5 {
        assert_eq!(evaluate(&tree, &reader, 4).unwrap().hits, first);
    }
    assert_eq!(first.len(), 4);
    for pair in first.windows(2) {
        assert!(pair[0].1 > pair[1].1 || (pair[0].1 == pair[1].1 && pair[0].0 < pair[1].0));
    }
}

#[test]
fn phrases_respect_positions_and_value_gaps() {
    let index = index_with(vec![
        Document::builder()
            .token("passage_ID", "split")
            .text("answers", "new")
            .text("answers", "york")
            .build(),
        Document::builder()
            .token("passage_ID", "joined")
            .text("answers", "new york")
            .build(),
        Document::builder()
            .token("passage_ID", "reversed")
            .text("answers", "york new")
            .build(),
    ]);
    let reader = index.reader().unwrap();
    assert_eq!(ids(&reader, "\"new york\"", &["answers"]), vec!["joined"]);

    let mut either: Vec<String> = ids(&reader, "new york", &["answers"]);
    either.sort();
    assert_eq!(either, vec!["joined", "reversed", "split"]);
}

#[test]
fn field_queries_and_operators() {
    let index = index_with(vec![
        passage("1", "rust search engine", "http://rust.example"),
        passage("2", "python search engine", "http://python.example"),
        passage("3", "rust compiler", "http://compiler.example"),
    ]);
    let reader = index.reader().unwrap();
    let fields = ["passage_text", "url"];

    let mut rust = ids(&reader, "rust", &fields);
    rust.sort();
    assert_eq!(rust, vec!["1", "3"]);
    assert_eq!(ids(&reader, "+rust +search", &fields), vec!["1"]);
    assert_eq!(ids(&reader, "search AND NOT python", &fields), vec!["1"]);
    assert_eq!(ids(&reader, "url:compiler", &fields), vec!["3"]);
    assert_eq!(ids(&reader, "passage_text:(python OR compiler) -rust", &fields), vec!["2"]);
    assert_eq!(ids(&reader, "passage_ID:2", &fields), vec!["2"]);
}

#[test]
fn syntax_errors_carry_positions() {
    let cases = [
        ("", 0),
        ("   ", 0),
        ("\"open phrase", 0),
        ("(rust", 0),
        ("rust)", 4),
        ("rust AND", 5),
        ("url:", 3),
    ];
    for (query, position) in cases {
        match parse(query, &["passage_text"]) {
            Err(SearchError::QuerySyntax { position: actual, .. }) => {
                assert_eq!(actual, position, "query {:?}", query)
            }
            other => panic!("query {:?} parsed as {:?}", query, other),
        }
    }
}

#[test]
fn parsed_tree_shape() {
    let tree = parse("url:\"a b\"", &["passage_text"]).unwrap();
    assert_eq!(tree, QueryTree::phrase("url", "a b"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn indexed_words_are_retrievable(words in proptest::collection::vec("[a-z]{3,8}", 1..6)) {
        let text = words.join(" ");
        let index = index_with(vec![passage("only", &text, "http://p")]);
        let reader = index.reader().unwrap();
        for word in &words {
            let tree = QueryTree::term("passage_text", word.as_str());
            let hits = evaluate(&tree, &reader, 10).unwrap().hits;
            let analyzed_away = reader
                .analyzers()
                .analyze("passage_text", passage_index::analysis::IndexedAs::Text, word)
                .is_empty();
            prop_assert_eq!(hits.len(), if analyzed_away { 0 } else { 1 });
        }
    }
}
