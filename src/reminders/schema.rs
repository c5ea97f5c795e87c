diesel::table! {
    reminders (source_id) {
        source_id -> Text,
        remind_at -> BigInt,
        published_id -> Nullable<Text>,
        created_at -> BigInt,
        source_payload -> Text,
        target_routes -> Text,
        attempts -> Integer,
        retry_after -> Nullable<BigInt>,
        last_error -> Nullable<Text>,
        abandoned_at -> Nullable<BigInt>,
    }
}
