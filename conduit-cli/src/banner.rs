//! Startup banner for the interactive verbs.

use colored::Colorize;

const TOP: &str = r"
                     -+*    ++-.
                  :=**+.     =**+:
                .+***:        .+**+:
               -***+            =***+
              =***=              -***+
             -+++=                -+++=
            :++++.     .::::.      ++++-
           .=+++-    -=++++++=-.   :=+++:";

const BOTTOM: &str = r"
      .:-==:...    .============:    ...:-=-:.
      -===-        ==============.       :===-
      :----       .--------------:       ----:
       :---:       --------------.      :----
        :::::      .:::::::::::::      :::::.
         :::::.      ::::::::::.      :::::.
          .::::..      ......       .::::.
            .:::::..            ..::::::.
              .::::::::......::::::::.
                 .::::::::::::::::..
";

pub fn print() {
    print!("{}{}", TOP.cyan(), BOTTOM.blue());
    println!("{}", "\t\t   Conduit CLI\n".white().bold());
}
