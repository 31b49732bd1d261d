diesel::table! {
    subscriptions (id) {
        id -> Uuid,
        email -> Text,
        city -> Text,
        frequency -> Text,
        confirmed -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tokens (id) {
        id -> Uuid,
        subscription_id -> Uuid,
        token -> Text,
        token_type -> Text,
        expires_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(tokens -> subscriptions (subscription_id));

diesel::allow_tables_to_appear_in_same_query!(subscriptions, tokens);
