#![cfg(feature = "rusqlite")]

use ::rusqlite::Connection;
use relq::Relq;

const SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        tenant_id INTEGER NOT NULL,
        active INTEGER NOT NULL DEFAULT 1
    );
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        user_id INTEGER,
        tenant_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        amount REAL NOT NULL,
        price REAL NOT NULL,
        quantity INTEGER NOT NULL
    );
    CREATE TABLE order_items (
        id INTEGER PRIMARY KEY,
        order_id INTEGER NOT NULL,
        sku TEXT NOT NULL,
        qty INTEGER NOT NULL
    );
    CREATE TABLE profiles (
        user_id INTEGER PRIMARY KEY,
        bio TEXT NOT NULL
    );
    CREATE TABLE categories (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER,
        name TEXT NOT NULL
    );
";

const SEED: &str = "
    INSERT INTO users (id, name, tenant_id, active) VALUES
        (1, 'ada', 10, 1),
        (2, 'brian', 10, 1),
        (3, 'cleo', 20, 0),
        (4, 'dan', 20, 1);
    INSERT INTO orders (id, user_id, tenant_id, status, amount, price, quantity) VALUES
        (1, 1, 10, 'paid', 600, 100, 6),
        (2, 1, 10, 'paid', 700, 350, 2),
        (3, 2, 10, 'void', 50, 25, 2),
        (4, 3, 20, 'paid', 30, 10, 3),
        (5, 99, 10, 'paid', 10, 10, 1),
        (6, 3, 10, 'paid', 5, 5, 1),
        (7, NULL, 10, 'paid', 1, 1, 1);
    INSERT INTO order_items (id, order_id, sku, qty) VALUES
        (1, 1, 'a', 1),
        (2, 1, 'b', 2),
        (3, 2, 'c', 1),
        (4, 4, 'd', 5);
    INSERT INTO profiles (user_id, bio) VALUES
        (1, 'math'),
        (3, 'art');
    INSERT INTO categories (id, parent_id, name) VALUES
        (1, NULL, 'root'),
        (2, 1, 'child a'),
        (3, 1, 'child b'),
        (4, 2, 'leaf');
";

pub fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.execute_batch(SCHEMA).expect("Failed to create tables");
    conn.execute_batch(SEED).expect("Failed to seed tables");
    conn
}

pub fn setup() -> Relq<Connection> {
    Relq::new(setup_db())
}
