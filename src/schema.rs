table! {
    dishes (id) {
        id -> Int4,
        title -> Varchar,
        description -> Text,
        category -> Varchar,
        price -> Double,
        image -> Nullable<Varchar>,
    }
}

table! {
    ingredients (id) {
        id -> Int4,
        dish_id -> Int4,
        name -> Varchar,
    }
}

joinable!(ingredients -> dishes (dish_id));

allow_tables_to_appear_in_same_query!(dishes, ingredients);
