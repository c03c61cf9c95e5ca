use booksuggest_core::tokenizer::{is_stopword, tokenize};
use booksuggest_core::StopWords;

#[test]
fn it_normalizes_unicode() {
    let words = tokenize("The café's menu. Ｄｕｎｅ", StopWords::English);
    // NFKC folds full-width letters; the apostrophe splits the possessive
    assert!(words.contains(&"café".to_string()));
    assert!(words.contains(&"dune".to_string()));
    assert!(!words.contains(&"s".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog", StopWords::English);
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words, vec!["quick", "brown", "fox", "lazy", "dog"]);
    assert!(is_stopword("whereupon"));
}

#[test]
fn it_keeps_digits_inside_words() {
    let words = tokenize("Catch-22 in 1984", StopWords::English);
    assert_eq!(words, vec!["catch", "22", "1984"]);
}
