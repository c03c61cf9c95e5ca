use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\b\w\w+\b").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","across","after","afterwards","again","against","all","almost","alone","along","already","also","although","always","am","among","amongst","an","and","another","any","anyhow","anyone","anything","anyway","anywhere","are","around","as","at",
            "back","be","became","because","become","becomes","becoming","been","before","beforehand","behind","being","below","beside","besides","between","beyond","both","but","by",
            "can","cannot","could","couldn",
            "did","didn","do","does","doesn","doing","don","done","down","due","during",
            "each","either","else","elsewhere","enough","etc","even","ever","every","everyone","everything","everywhere","except",
            "few","for","former","formerly","from","further",
            "had","hadn","has","hasn","have","haven","having","he","hence","her","here","hereafter","hereby","herein","hers","herself","him","himself","his","how","however",
            "ie","if","in","indeed","into","is","isn","it","its","itself",
            "just","last","latter","least","less","ll","ltd",
            "many","may","me","meanwhile","might","more","moreover","most","mostly","much","must","my","myself",
            "namely","neither","never","nevertheless","next","no","nobody","none","nor","not","nothing","now","nowhere",
            "of","off","often","on","once","one","only","onto","or","other","others","otherwise","our","ours","ourselves","out","over","own",
            "per","perhaps","please","rather","re",
            "same","seem","seemed","seeming","seems","several","she","should","shouldn","since","so","some","somehow","someone","something","sometime","sometimes","somewhere","still","such",
            "than","that","the","their","theirs","them","themselves","then","thence","there","thereafter","thereby","therefore","therein","thereupon","these","they","this","those","though","through","throughout","thru","thus","to","together","too","toward","towards",
            "under","until","up","upon","us",
            "ve","very","via",
            "was","wasn","we","well","were","weren","what","whatever","when","whence","whenever","where","whereafter","whereas","whereby","wherein","whereupon","wherever","whether","which","while","whither","who","whoever","whole","whom","whose","why","will","with","within","without","won","would","wouldn",
            "yet","you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Which stop-word list the tokenizer filters against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StopWords {
    #[default]
    English,
    None,
}

impl StopWords {
    fn contains(self, token: &str) -> bool {
        match self {
            StopWords::English => STOPWORDS.contains(token),
            StopWords::None => false,
        }
    }
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text using NFKC normalization and lowercasing. Punctuation
/// separates tokens; tokens shorter than two characters and stop words are
/// dropped. Output order follows the text.
pub fn tokenize(text: &str, stop_words: StopWords) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|t| !stop_words.contains(t))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_case() {
        let t = tokenize("Spice, SPICE! worms...", StopWords::English);
        assert_eq!(t, vec!["spice", "spice", "worms"]);
    }

    #[test]
    fn single_characters_are_not_tokens() {
        let t = tokenize("x y zz", StopWords::None);
        assert_eq!(t, vec!["zz"]);
    }

    #[test]
    fn stop_word_list_can_be_disabled() {
        assert!(tokenize("the and of", StopWords::English).is_empty());
        assert_eq!(tokenize("the and of", StopWords::None).len(), 3);
    }
}
