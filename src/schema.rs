diesel::table! {
    users (id) {
        id -> Int4,
        username -> Varchar,
        email -> Varchar,
        password -> Varchar,
    }
}

diesel::table! {
    campgrounds (id) {
        id -> Int4,
        title -> Varchar,
        description -> Text,
        price -> Float8,
        location -> Varchar,
        longitude -> Float8,
        latitude -> Float8,
        author_id -> Int4,
    }
}

diesel::table! {
    campground_images (id) {
        id -> Int4,
        campground_id -> Int4,
        url -> Varchar,
        filename -> Varchar,
    }
}

diesel::table! {
    reviews (id) {
        id -> Int4,
        campground_id -> Int4,
        author_id -> Int4,
        rating -> Int2,
        body -> Text,
    }
}

diesel::table! {
    sessions (id) {
        id -> Varchar,
        user_id -> Nullable<Int4>,
        data -> Text,
        expires_at -> Timestamp,
    }
}

diesel::joinable!(campgrounds -> users (author_id));
diesel::joinable!(campground_images -> campgrounds (campground_id));
diesel::joinable!(reviews -> campgrounds (campground_id));
diesel::joinable!(reviews -> users (author_id));
diesel::joinable!(sessions -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    campground_images,
    campgrounds,
    reviews,
    sessions,
    users,
);
