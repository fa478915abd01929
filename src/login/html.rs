//! Pages returned to the browser by the callback listener.

/// Shown when the browser login succeeds.
pub const DEFAULT_OK_CALLBACK_HTML: &str = r#"<html>
  <head></head>
  <body>
    Successfully authorized.<br/>
    This page will be closed in a few seconds.
    <script>
      setTimeout(function() { window.close() }, 5000);
    </script>
  </body>
</html>
"#;

/// Shown when the browser login fails.
pub const DEFAULT_ERR_CALLBACK_HTML: &str = r#"<html>
  <head></head>
  <body>
    Authorization failed.<br/>
    This page will be closed in a few seconds.
    <script>
      setTimeout(function() { window.close() }, 5000);
    </script>
  </body>
</html>
"#;
