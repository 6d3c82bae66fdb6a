//! Fixed HTML shells for the viewer pages
//!
//! Each page is a constant with at most one interpolation marker; rendering
//! is plain marker replacement in the server module.

/// Listing page; `{links}` is replaced with the concatenated record links
pub const LIST_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Logs</title>
    <style>
        body { font-family: Arial, sans-serif; }
        a { display: block; margin-bottom: 10px; }
    </style>
</head>
<body>
    <header>
        <h1>Logs</h1>
    </header>
    <main>
        {links}
    </main>
    <footer>
        <p>&copy; 2024 Your Company</p>
    </footer>
</body>
</html>"#;

/// Detail page; `{detail}` is replaced with the serialized record
pub const DETAIL_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Log Detail</title>
    <style>
        body { font-family: Arial, sans-serif; }
        pre { background-color: #f0f0f0; padding: 10px; border-radius: 5px; }
    </style>
</head>
<body>
    <header>
        <h1>Log Detail</h1>
    </header>
    <main>
        <pre>{detail}</pre>
    </main>
    <footer>
        <p>&copy; 2024 Your Company</p>
    </footer>
</body>
</html>"#;

/// Confirmation page returned for every recorded request
pub const LOG_ADDED_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Log Added</title>
</head>
<body>
    <header>
        <h1>Log Added</h1>
    </header>
    <main>
        <p>Log has been successfully added.</p>
    </main>
    <footer>
        <p>&copy; 2024 Your Company</p>
    </footer>
</body>
</html>"#;
