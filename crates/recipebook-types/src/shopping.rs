use std::collections::BTreeMap;

pub const SHOPPING_LIST_HEADER: &str = "Shopping list";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_CONTENT_TYPE: &str = "text/plain";

/// A single ingredient line pulled from one recipe in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// One merged entry of the shopping list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Merge lines by (name, unit) and sum their amounts.
///
/// Output is ordered by name in byte order, then by unit, so the same
/// cart always renders the same report.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingItem>
where
    I: IntoIterator<Item = CartLine>,
{
    let mut merged: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *merged.entry((line.name, line.measurement_unit)).or_default() += line.amount;
    }

    merged
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingItem {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

pub fn render(items: &[ShoppingItem]) -> String {
    let mut out = String::from(SHOPPING_LIST_HEADER);
    for item in items {
        out.push('\n');
        out.push_str(&format!(
            "{} ({}) - {}",
            item.name, item.measurement_unit, item.amount
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, unit: &str, amount: i64) -> CartLine {
        CartLine {
            name: name.into(),
            measurement_unit: unit.into(),
            amount,
        }
    }

    #[test]
    fn empty_cart_is_header_only() {
        assert_eq!(render(&aggregate(Vec::new())), "Shopping list");
    }

    #[test]
    fn sums_same_ingredient_and_unit() {
        let items = aggregate(vec![line("Salt", "g", 10), line("Salt", "g", 15)]);
        assert_eq!(render(&items), "Shopping list\nSalt (g) - 25");
    }

    #[test]
    fn different_units_stay_separate() {
        let items = aggregate(vec![
            line("Milk", "ml", 200),
            line("Milk", "cup", 1),
            line("Milk", "ml", 300),
        ]);
        assert_eq!(
            render(&items),
            "Shopping list\nMilk (cup) - 1\nMilk (ml) - 500"
        );
    }

    #[test]
    fn ordering_is_byte_order() {
        let items = aggregate(vec![
            line("egg", "pcs", 2),
            line("Sugar", "g", 50),
            line("Apple", "pcs", 3),
        ]);
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "Sugar", "egg"]);
    }
}
