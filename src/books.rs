/// A canonical Bible book. `number` is the book number the catalog API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Book {
    pub number: u32,
    pub name: &'static str,
    pub abbreviation: &'static str,
}

const fn book(number: u32, abbreviation: &'static str, name: &'static str) -> Book {
    Book { number, name, abbreviation }
}

pub static BOOKS: [Book; 66] = [
    book(1, "Gen", "Genesis"),
    book(2, "Ex", "Exodus"),
    book(3, "Lev", "Leviticus"),
    book(4, "Num", "Numbers"),
    book(5, "Deut", "Deuteronomy"),
    book(6, "Josh", "Joshua"),
    book(7, "Judg", "Judges"),
    book(8, "Ruth", "Ruth"),
    book(9, "1 Sam", "1 Samuel"),
    book(10, "2 Sam", "2 Samuel"),
    book(11, "1 Ki", "1 Kings"),
    book(12, "2 Ki", "2 Kings"),
    book(13, "1 Chron", "1 Chronicles"),
    book(14, "2 Chron", "2 Chronicles"),
    book(15, "Ezra", "Ezra"),
    book(16, "Neh", "Nehemiah"),
    book(17, "Esther", "Esther"),
    book(18, "Job", "Job"),
    book(19, "Ps", "Psalms"),
    book(20, "Prov", "Proverbs"),
    book(21, "Eccl", "Ecclesiastes"),
    book(22, "Song", "Song of Solomon"),
    book(23, "Isa", "Isaiah"),
    book(24, "Jer", "Jeremiah"),
    book(25, "Lam", "Lamentations"),
    book(26, "Ezek", "Ezekiel"),
    book(27, "Dan", "Daniel"),
    book(28, "Hos", "Hosea"),
    book(29, "Joel", "Joel"),
    book(30, "Amos", "Amos"),
    book(31, "Obad", "Obadiah"),
    book(32, "Jonah", "Jonah"),
    book(33, "Mic", "Micah"),
    book(34, "Nah", "Nahum"),
    book(35, "Hab", "Habakkuk"),
    book(36, "Zeph", "Zephaniah"),
    book(37, "Hag", "Haggai"),
    book(38, "Zech", "Zechariah"),
    book(39, "Mal", "Malachi"),
    book(40, "Matt", "Matthew"),
    book(41, "Mark", "Mark"),
    book(42, "Luke", "Luke"),
    book(43, "John", "John"),
    book(44, "Acts", "Acts"),
    book(45, "Rom", "Romans"),
    book(46, "1 Cor", "1 Corinthians"),
    book(47, "2 Cor", "2 Corinthians"),
    book(48, "Gal", "Galatians"),
    book(49, "Eph", "Ephesians"),
    book(50, "Phil", "Philippians"),
    book(51, "Col", "Colossians"),
    book(52, "1 Thes", "1 Thessalonians"),
    book(53, "2 Thes", "2 Thessalonians"),
    book(54, "1 Tim", "1 Timothy"),
    book(55, "2 Tim", "2 Timothy"),
    book(56, "Titus", "Titus"),
    book(57, "Philem", "Philemon"),
    book(58, "Heb", "Hebrews"),
    book(59, "Jas", "James"),
    book(60, "1 Pet", "1 Peter"),
    book(61, "2 Pet", "2 Peter"),
    book(62, "1 John", "1 John"),
    book(63, "2 John", "2 John"),
    book(64, "3 John", "3 John"),
    book(65, "Jude", "Jude"),
    book(66, "Rev", "Revelation"),
];

/// Look up a book by its full name or abbreviation, ignoring case and
/// surrounding whitespace.
pub fn find_by_name(name: &str) -> Option<&'static Book> {
    let name = name.trim();
    BOOKS
        .iter()
        .find(|b| b.name.eq_ignore_ascii_case(name) || b.abbreviation.eq_ignore_ascii_case(name))
}

/// Book names ordered so that longer names come first ("1 John" before "John").
pub fn names_longest_first() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = BOOKS.iter().map(|b| b.name).collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_sequential() {
        for (i, b) in BOOKS.iter().enumerate() {
            assert_eq!(b.number as usize, i + 1, "{}", b.name);
        }
    }

    #[test]
    fn lookups() {
        assert_eq!(find_by_name("song of solomon").map(|b| b.number), Some(22));
        assert_eq!(find_by_name(" Isaiah ").map(|b| b.number), Some(23));
        assert_eq!(find_by_name("1 JOHN").map(|b| b.number), Some(62));
        assert!(find_by_name("Maccabees").is_none());
    }

    #[test]
    fn numbered_names_sort_before_bare_names() {
        let names = names_longest_first();
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("1 John") < pos("John"));
        assert!(pos("Song of Solomon") < pos("Job"));
    }
}
