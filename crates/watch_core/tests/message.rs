use pretty_assertions::assert_eq;
use watch_core::{ChangeEvent, Listing, MessageFormatter};

const ITEM_BASE: &str = "https://www.yad2.co.il/realestate/item";

fn listing(id: &str, price: Option<i64>) -> Listing {
    Listing {
        id: id.into(),
        price,
        rooms: Some(3.5),
        size_sqm: Some(82.0),
        city: Some("Rishon LeZion".into()),
        neighborhood_name: Some("Kiryat Rishon".into()),
        street: Some("Herzl".into()),
        floor: Some("3".into()),
        seller_phone: Some("050-1234567".into()),
        is_private: true,
        ..Listing::default()
    }
}

fn format(event: &ChangeEvent) -> String {
    MessageFormatter::new(ITEM_BASE).format(event).unwrap()
}

#[test]
fn new_listing_message() {
    let text = format(&ChangeEvent::New(listing("a1", Some(2_000_000))));
    assert_eq!(
        text,
        "🔔 New apartment\n\
         Rishon LeZion, Kiryat Rishon, Herzl\n\
         3.5 rooms | 82 sqm | floor 3\n\
         Price: 2,000,000 ₪\n\
         (private seller)\n\
         Phone: 050-1234567\n\
         https://www.yad2.co.il/realestate/item/a1"
    );
}

#[test]
fn new_listing_without_details() {
    let bare = Listing {
        id: "a9".into(),
        ..Listing::default()
    };
    assert_eq!(
        format(&ChangeEvent::New(bare)),
        "🔔 New apartment\n\
         Price: not listed\n\
         (agency)\n\
         https://www.yad2.co.il/realestate/item/a9"
    );
}

#[test]
fn price_change_message() {
    let text = format(&ChangeEvent::PriceChanged {
        listing: listing("a1", Some(1_950_000)),
        old_price: 2_000_000,
        new_price: 1_950_000,
    });
    assert_eq!(
        text,
        "💸 Price change\n\
         Rishon LeZion, Kiryat Rishon, Herzl\n\
         3.5 rooms | 82 sqm | floor 3\n\
         Old price: 2,000,000 ₪\n\
         New price: 1,950,000 ₪\n\
         Change: -50,000 ₪\n\
         Phone: 050-1234567\n\
         https://www.yad2.co.il/realestate/item/a1"
    );
}

#[test]
fn possible_repost_links_both_postings() {
    let text = format(&ChangeEvent::PossibleRepost {
        listing: listing("a2", None),
        prior: listing("a1", Some(2_000_000)),
    });
    assert_eq!(
        text,
        "🔁 Possible repost by the same seller\n\
         Rishon LeZion, Kiryat Rishon, Herzl\n\
         3.5 rooms | 82 sqm | floor 3\n\
         Previous price: 2,000,000 ₪\n\
         Price: not listed\n\
         Phone: 050-1234567\n\
         New link: https://www.yad2.co.il/realestate/item/a2\n\
         Previous link: https://www.yad2.co.il/realestate/item/a1"
    );
}

#[test]
fn unchanged_is_not_rendered() {
    let formatter = MessageFormatter::new(ITEM_BASE);
    assert_eq!(formatter.format(&ChangeEvent::Unchanged("a1".into())), None);
}

#[test]
fn extreme_price_change_does_not_overflow() {
    let rise = format(&ChangeEvent::PriceChanged {
        listing: listing("a1", Some(i64::MAX)),
        old_price: -1,
        new_price: i64::MAX,
    });
    assert!(rise.contains("Change: +9,223,372,036,854,775,807 ₪"));

    let drop = format(&ChangeEvent::PriceChanged {
        listing: listing("a1", Some(-1)),
        old_price: i64::MAX,
        new_price: -1,
    });
    assert!(drop.contains("Change: -9,223,372,036,854,775,808 ₪"));
}
