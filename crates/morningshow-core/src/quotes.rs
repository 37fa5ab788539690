use chrono::{Datelike, NaiveDate};

use crate::error::ConfigError;

const DEFAULT_QUOTES: [&str; 10] = [
    "Дисциплина бьёт мотивацию в любой день недели.",
    "Маленькие шаги ежедневно дают большие рывки раз в квартал.",
    "Фокус — это умение сказать «нет» девяноста идеям из ста.",
    "Сила в том, чтобы делать правильно, когда никто не смотрит.",
    "Качество жизни — это качество твоих решений.",
    "Результаты — это математика, эмоции — побочный шум.",
    "Планируй как стратег, действуй как инженер, фиксируй как трейдер.",
    "Ты не обязан быть идеальным — ты обязан быть последовательным.",
    "Сомнения уходят после первых 30 минут работы.",
    "Скорость без вектора — просто суета.",
];

/// Fixed, ordered list of quotes with a deterministic quote of the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBook {
    quotes: Vec<String>,
}

impl Default for QuoteBook {
    fn default() -> Self {
        Self {
            quotes: DEFAULT_QUOTES.iter().map(|quote| (*quote).to_owned()).collect(),
        }
    }
}

impl QuoteBook {
    /// # Errors
    ///
    /// [`ConfigError::EmptyQuoteList`] when `quotes` is empty.
    pub fn new(quotes: Vec<String>) -> Result<Self, ConfigError> {
        if quotes.is_empty() {
            return Err(ConfigError::EmptyQuoteList);
        }
        Ok(Self { quotes })
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Quote for `date`: index is the proleptic Gregorian ordinal (0001-01-01 is 1)
    /// modulo the number of quotes.
    pub fn quote_for(&self, date: NaiveDate) -> &str {
        let index = ordinal(date).rem_euclid(self.quotes.len() as i64) as usize;
        &self.quotes[index]
    }
}

fn ordinal(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn ordinal_starts_at_one() {
        assert_eq!(ordinal(day(1, 1, 1)), 1);
        assert_eq!(ordinal(day(2024, 1, 1)), 738_886);
    }

    #[test]
    fn same_day_same_quote_and_period_is_list_length() {
        let book = QuoteBook::default();
        let start = day(2024, 6, 3);

        assert_eq!(book.quote_for(start), book.quote_for(start));
        let period = u64::try_from(book.len()).expect("small list");
        let later = start.checked_add_days(Days::new(period)).expect("in range");
        assert_eq!(book.quote_for(start), book.quote_for(later));

        let next = start.checked_add_days(Days::new(1)).expect("in range");
        assert_ne!(book.quote_for(start), book.quote_for(next));
    }

    #[test]
    fn index_follows_ordinal_modulo_length() {
        let book = QuoteBook::default();
        // 738886 % 10 == 6
        assert_eq!(book.quote_for(day(2024, 1, 1)), DEFAULT_QUOTES[6]);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert_eq!(QuoteBook::new(Vec::new()), Err(ConfigError::EmptyQuoteList));

        let book = QuoteBook::new(vec!["один".to_owned(), "два".to_owned()]).expect("non-empty");
        assert_eq!(book.quote_for(day(1, 1, 1)), "два");
    }
}
